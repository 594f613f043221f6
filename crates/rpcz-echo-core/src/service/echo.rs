use crate::{
    context::Context,
    error::{Error, Result},
    proto::{EchoRequest, EchoResponse},
    service::Handler,
};

/// Replies with the message it receives.
#[derive(Clone, Copy, Debug, Default)]
pub struct Echo;

impl Echo {
    pub const fn new() -> Self {
        Self
    }
}

impl Handler for Echo {
    fn validate(&self, req: &EchoRequest) -> Result<()> {
        if req.msg.is_empty() {
            return Err(Error::invalid("msg", "must not be empty"));
        }
        Ok(())
    }

    async fn echo(&self, _ctx: Context, req: EchoRequest) -> Result<EchoResponse> {
        self.validate(&req)?;
        Ok(EchoResponse { msg: req.msg })
    }
}
