/// Redis RESP (Redis Serialization Protocol) generation
use bytes::{BufMut, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// RESP encoder for writing Redis protocol frames
pub struct RespEncoder;

impl RespEncoder {
    /// Array header (*3\r\n)
    pub fn write_array_header(buf: &mut BytesMut, len: usize) {
        buf.put_u8(b'*');
        write_decimal(buf, len as u64);
        buf.put_slice(CRLF);
    }

    /// Bulk String ($5\r\nhello\r\n)
    pub fn write_bulk_string(buf: &mut BytesMut, data: &[u8]) {
        buf.reserve(data.len() + 16);
        buf.put_u8(b'$');
        write_decimal(buf, data.len() as u64);
        buf.put_slice(CRLF);
        buf.put_slice(data);
        buf.put_slice(CRLF);
    }
}

fn write_decimal(buf: &mut BytesMut, mut value: u64) {
    // Stack buffer keeps length prefixes allocation-free on the hot path.
    let mut digits = [0u8; 20];
    let mut pos = digits.len();
    loop {
        pos -= 1;
        digits[pos] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    buf.put_slice(&digits[pos..]);
}
