//! Sans-IO reachability ping.
//!
//! The cheapest request a DC answers without an auth key is the first step
//! of key generation, `req_pq_multi`. A matching `resPQ` proves the whole
//! route (proxy included) delivers MTProto traffic both ways.
//!
//! ```text
//! let ping = Ping::new()?;
//! let msg  = session.pack(ping.body());
//! // send msg.to_plaintext_bytes(), receive frame
//! let res  = ping.verify(plaintext_body(&frame)?)?;
//! ```

use crate::Error;

/// `req_pq_multi#be7e8ef1 nonce:int128 = ResPQ`
pub const ID_REQ_PQ_MULTI: u32 = 0xbe7e8ef1;
/// `resPQ#05162463 nonce:int128 server_nonce:int128 pq:string server_public_key_fingerprints:Vector<long> = ResPQ`
pub const ID_RES_PQ: u32 = 0x05162463;
const ID_VECTOR: u32 = 0x1cb5c415;

/// An outstanding ping.
#[derive(Clone, Debug)]
pub struct Ping {
    nonce: [u8; 16],
}

/// The decoded server answer.
#[derive(Clone, Debug, PartialEq)]
pub struct ResPq {
    pub nonce:        [u8; 16],
    pub server_nonce: [u8; 16],
    pub pq:           Vec<u8>,
    pub fingerprints: Vec<i64>,
}

impl Ping {
    /// New ping with a random nonce.
    pub fn new() -> Result<Self, getrandom::Error> {
        let mut nonce = [0u8; 16];
        getrandom::getrandom(&mut nonce)?;
        Ok(Self { nonce })
    }

    pub fn with_nonce(nonce: [u8; 16]) -> Self {
        Self { nonce }
    }

    pub fn nonce(&self) -> &[u8; 16] {
        &self.nonce
    }

    /// TL-serialized `req_pq_multi`.
    pub fn body(&self) -> Vec<u8> {
        let mut b = Vec::with_capacity(20);
        b.extend(ID_REQ_PQ_MULTI.to_le_bytes());
        b.extend(self.nonce);
        b
    }

    /// Decode `body` as `resPQ` and check it answers this ping.
    pub fn verify(&self, body: &[u8]) -> Result<ResPq, Error> {
        let res = ResPq::decode(body)?;
        if res.nonce != self.nonce {
            return Err(Error::InvalidNonce { got: res.nonce, expected: self.nonce });
        }
        Ok(res)
    }
}

impl ResPq {
    pub fn decode(body: &[u8]) -> Result<Self, Error> {
        let mut r = Reader { buf: body, pos: 0 };
        let id = r.u32()?;
        if id != ID_RES_PQ {
            return Err(Error::UnexpectedConstructor { got: id, expected: ID_RES_PQ });
        }
        let nonce        = r.int128()?;
        let server_nonce = r.int128()?;
        let pq           = r.bytes()?;
        let vector_id    = r.u32()?;
        if vector_id != ID_VECTOR {
            return Err(Error::UnexpectedConstructor { got: vector_id, expected: ID_VECTOR });
        }
        let count = r.u32()? as usize;
        let mut fingerprints = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            fingerprints.push(r.i64()?);
        }
        Ok(Self { nonce, server_nonce, pq, fingerprints })
    }

    /// TL-serialize, as a server would. Used to build test fixtures.
    pub fn encode(&self) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend(ID_RES_PQ.to_le_bytes());
        b.extend(self.nonce);
        b.extend(self.server_nonce);
        write_bytes(&mut b, &self.pq);
        b.extend(ID_VECTOR.to_le_bytes());
        b.extend((self.fingerprints.len() as u32).to_le_bytes());
        for f in &self.fingerprints {
            b.extend(f.to_le_bytes());
        }
        b
    }
}

// ─── TL primitives ────────────────────────────────────────────────────────────

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.buf.len() - self.pos < n {
            return Err(Error::Malformed("unexpected end of body"));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u32(&mut self) -> Result<u32, Error> {
        let s = self.take(4)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    fn i64(&mut self) -> Result<i64, Error> {
        let mut a = [0u8; 8];
        a.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(a))
    }

    fn int128(&mut self) -> Result<[u8; 16], Error> {
        let mut a = [0u8; 16];
        a.copy_from_slice(self.take(16)?);
        Ok(a)
    }

    fn bytes(&mut self) -> Result<Vec<u8>, Error> {
        let first = self.take(1)?[0];
        let (len, header) = if first < 254 {
            (first as usize, 1)
        } else {
            let b = self.take(3)?;
            (b[0] as usize | (b[1] as usize) << 8 | (b[2] as usize) << 16, 4)
        };
        let data = self.take(len)?.to_vec();
        let padding = (4 - (header + len) % 4) % 4;
        self.take(padding)?;
        Ok(data)
    }
}

fn write_bytes(b: &mut Vec<u8>, data: &[u8]) {
    let header = if data.len() < 254 {
        b.push(data.len() as u8);
        1
    } else {
        let n = data.len();
        b.extend([254, (n & 0xff) as u8, ((n >> 8) & 0xff) as u8, ((n >> 16) & 0xff) as u8]);
        4
    };
    b.extend(data);
    let padding = (4 - (header + data.len()) % 4) % 4;
    b.extend(std::iter::repeat_n(0u8, padding));
}
