/// Read/write intent of a connection request
use std::fmt;

/// Caller's declared purpose for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Read,
    Write,
}

impl Intent {
    /// Classify a command by name. Read-only commands may be served by
    /// replicas; everything else must reach the primary.
    pub fn for_command(command: &str) -> Self {
        if is_readonly_command(command) {
            Intent::Read
        } else {
            Intent::Write
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Read => write!(f, "READ"),
            Intent::Write => write!(f, "WRITE"),
        }
    }
}

/// Check if a Redis command is read-only
fn is_readonly_command(command: &str) -> bool {
    matches!(
        command.to_ascii_uppercase().as_str(),
        "GET"
            | "MGET"
            | "GETRANGE"
            | "STRLEN"
            | "EXISTS"
            | "TTL"
            | "PTTL"
            | "TYPE"
            | "KEYS"
            | "SCAN"
            | "RANDOMKEY"
            | "DBSIZE"
            | "BITCOUNT"
            | "BITPOS"
            | "GETBIT"
            | "HGET"
            | "HMGET"
            | "HGETALL"
            | "HKEYS"
            | "HVALS"
            | "HLEN"
            | "HEXISTS"
            | "HSTRLEN"
            | "HSCAN"
            | "LLEN"
            | "LINDEX"
            | "LRANGE"
            | "SCARD"
            | "SISMEMBER"
            | "SMEMBERS"
            | "SRANDMEMBER"
            | "SINTER"
            | "SUNION"
            | "SDIFF"
            | "SSCAN"
            | "ZCARD"
            | "ZCOUNT"
            | "ZLEXCOUNT"
            | "ZRANGE"
            | "ZRANGEBYLEX"
            | "ZRANGEBYSCORE"
            | "ZRANK"
            | "ZREVRANGE"
            | "ZREVRANGEBYLEX"
            | "ZREVRANGEBYSCORE"
            | "ZREVRANK"
            | "ZSCORE"
            | "ZSCAN"
            | "PFCOUNT"
            | "GEOPOS"
            | "GEODIST"
            | "GEOHASH"
    )
}
