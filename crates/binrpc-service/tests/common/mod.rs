#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use binrpc_codec::{Decode, Encode, Reader, Result, Writer};
use binrpc_frame::{DispatchTable, HandlerError, MessageType};
use binrpc_service::{Server, ServerConfig, ServerHandle};

#[derive(Debug, Clone, PartialEq)]
pub struct Echo {
    pub id: u32,
    pub text: String,
}

impl Encode for Echo {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_u32(self.id)?;
        writer.write_str(&self.text)
    }
}

impl Decode for Echo {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Echo {
            id: reader.read_u32()?,
            text: reader.read_string()?,
        })
    }
}

impl MessageType for Echo {
    const COMMAND: u16 = 1;
    const VERSION: u16 = 1;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EchoReply {
    pub id: u32,
    pub text: String,
}

impl Encode for EchoReply {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_u32(self.id)?;
        writer.write_str(&self.text)
    }
}

impl Decode for EchoReply {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(EchoReply {
            id: reader.read_u32()?,
            text: reader.read_string()?,
        })
    }
}

impl MessageType for EchoReply {
    const COMMAND: u16 = 2;
    const VERSION: u16 = 1;
}

/// Request whose handler panics.
#[derive(Debug, Clone, PartialEq)]
pub struct Crash {
    pub reason: String,
}

impl Encode for Crash {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_str(&self.reason)
    }
}

impl Decode for Crash {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Crash {
            reason: reader.read_string()?,
        })
    }
}

impl MessageType for Crash {
    const COMMAND: u16 = 3;
    const VERSION: u16 = 1;
}

/// Request whose handler returns an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Reject {
    pub code: u8,
}

impl Encode for Reject {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_u8(self.code)
    }
}

impl Decode for Reject {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Reject {
            code: reader.read_u8()?,
        })
    }
}

impl MessageType for Reject {
    const COMMAND: u16 = 4;
    const VERSION: u16 = 1;
}

/// Request whose handler sleeps before replying.
#[derive(Debug, Clone, PartialEq)]
pub struct Sleep {
    pub millis: u64,
}

impl Encode for Sleep {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_u64(self.millis)
    }
}

impl Decode for Sleep {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Sleep {
            millis: reader.read_u64()?,
        })
    }
}

impl MessageType for Sleep {
    const COMMAND: u16 = 5;
    const VERSION: u16 = 1;
}

pub fn server_table() -> Arc<DispatchTable> {
    Arc::new(
        DispatchTable::builder()
            .handle(|req: Echo| {
                Ok::<_, HandlerError>(EchoReply {
                    id: req.id,
                    text: req.text,
                })
            })
            .handle(|req: Crash| -> std::result::Result<EchoReply, HandlerError> {
                panic!("crash requested: {}", req.reason)
            })
            .handle(|req: Reject| Err::<EchoReply, _>(format!("rejected with code {}", req.code)))
            .handle(|req: Sleep| {
                thread::sleep(Duration::from_millis(req.millis));
                Ok::<_, HandlerError>(EchoReply {
                    id: 0,
                    text: "awake".to_string(),
                })
            })
            .build(),
    )
}

pub fn client_table() -> Arc<DispatchTable> {
    Arc::new(DispatchTable::builder().register::<EchoReply>().build())
}

pub fn start_server(config: ServerConfig) -> (ServerHandle, String) {
    let server = Server::new(config, server_table()).expect("server config should be valid");
    let handle = server
        .listen_and_serve("127.0.0.1:0")
        .expect("server should bind to an ephemeral port");
    let address = handle
        .local_addr()
        .expect("tcp listener should report its address")
        .to_string();
    (handle, address)
}
