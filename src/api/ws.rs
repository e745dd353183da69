//! Live counter push: a websocket session per dashboard tab, carrying
//! today's insert counters and the change-feed connectivity flag.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tracing::debug;

use crate::realtime::RefreshShared;

use super::handlers::AppState;

const PUSH_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CounterSocket {
    shared: Arc<RefreshShared>,
    last_heartbeat: Instant,
}

impl CounterSocket {
    fn new(shared: Arc<RefreshShared>) -> Self {
        Self { shared, last_heartbeat: Instant::now() }
    }

    fn push_snapshot(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let payload = serde_json::json!({
            "type": "counters",
            "feed": self.shared.connectivity(),
            "today": self.shared.counters(),
        });
        ctx.text(payload.to_string());
    }
}

impl Actor for CounterSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.push_snapshot(ctx);
        ctx.run_interval(PUSH_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                debug!("counter socket timed out, closing");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
            act.push_snapshot(ctx);
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for CounterSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            // Clients only listen; inbound text/binary is ignored.
            Ok(_) => {}
            Err(_) => ctx.stop(),
        }
    }
}

pub async fn counter_stream(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    ws::start(CounterSocket::new(Arc::clone(&state.realtime)), &req, stream)
}
