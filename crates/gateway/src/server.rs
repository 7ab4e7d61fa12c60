use std::sync::Arc;

use pingora::prelude::*;
use pingora::server::configuration::Opt;
use pingora::server::RunArgs;
use pingora::server::Server as PingoraServer;
use registry::Registry;

use crate::configuration::GatewayConfig;
use crate::limiter::Limiter;
use crate::proxy::CompletionProxy;
use crate::usage::UsageStore;

pub struct Server {
    server: PingoraServer,
}

impl Server {
    pub fn new(opt: Option<Opt>) -> Result<Self> {
        let server = PingoraServer::new(opt)?;
        Ok(Server { server })
    }

    pub fn bootstrap(
        &mut self,
        config: GatewayConfig,
        registry: Arc<Registry>,
        store: Arc<UsageStore>,
        limiter: Arc<Limiter>,
    ) -> Result<()> {
        self.server.bootstrap();

        let mut proxy_service = http_proxy_service(
            &self.server.configuration,
            CompletionProxy::new(&config, registry, store, limiter),
        );
        proxy_service.add_tcp(&config.listen);

        self.server.add_service(proxy_service);

        Ok(())
    }

    pub fn run_forever(self) {
        self.server.run_forever();
    }

    pub fn run(self, args: RunArgs) {
        self.server.run(args);
    }
}
