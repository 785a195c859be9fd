use std::sync::Arc;
use std::thread;

use binrpc::codec::Limits;
use binrpc::echo::{self, EchoRequest, EchoResponse};
use binrpc::{Client, ClientConfig, Context, Server, ServerConfig};

fn start() -> (binrpc::ServerHandle, String) {
    start_with(ServerConfig::default())
}

fn start_with(config: ServerConfig) -> (binrpc::ServerHandle, String) {
    let server = Server::new(config, Arc::new(echo::server_table()))
        .expect("server config should be valid");
    let handle = server
        .listen_and_serve("127.0.0.1:0")
        .expect("server should bind");
    let address = handle
        .local_addr()
        .expect("server should report its address")
        .to_string();
    (handle, address)
}

#[test]
fn echo_through_the_facade() {
    let (handle, address) = start();
    let ctx = Context::background();
    let client = Client::connect(
        &ctx,
        &address,
        ClientConfig::default(),
        Arc::new(echo::client_table()),
    )
    .expect("client should connect");

    let reply: EchoResponse = client
        .call_with_retry_as(&ctx, &EchoRequest::new(3, "ünïcode").with_tags(["t"]), 2)
        .expect("echo should succeed");
    assert_eq!(reply.id, 3);
    assert_eq!(reply.text, "ünïcode");
    assert_eq!(reply.tags, vec!["t".to_string()]);
    assert_eq!(reply.chars, 7);

    handle.stop().expect("server should stop");
}

#[test]
fn many_clients_share_one_server() {
    let (handle, address) = start();

    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let address = address.clone();
            thread::spawn(move || {
                let ctx = Context::background();
                let config = ClientConfig {
                    pool_size: 2,
                    ..ClientConfig::default()
                };
                let client = Client::connect(&ctx, &address, config, Arc::new(echo::client_table()))
                    .expect("client should connect");
                for i in 0..25u64 {
                    let id = worker * 1000 + i;
                    let reply: EchoResponse = client
                        .call_as(&ctx, &EchoRequest::new(id, format!("msg-{id}")))
                        .expect("echo should succeed");
                    assert_eq!(reply.id, id);
                    assert_eq!(reply.text, format!("msg-{id}"));
                }
                client.close().expect("client should close");
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker should not panic");
    }

    handle.stop().expect("server should stop");
}

#[test]
fn request_at_string_limit_round_trips() {
    let limits = Limits::new(2 * 1024 * 1024, 1024, 1024, 256).expect("limits should be valid");
    let (handle, address) = start_with(ServerConfig {
        limits,
        ..ServerConfig::default()
    });
    let ctx = Context::background();
    let config = ClientConfig {
        limits,
        ..ClientConfig::default()
    };
    let client = Client::connect(&ctx, &address, config, Arc::new(echo::client_table()))
        .expect("client should connect");

    let text = "a".repeat(1024);
    let reply: EchoResponse = client
        .call_as(&ctx, &EchoRequest::new(1, text.clone()))
        .expect("max-length string should round trip");
    assert_eq!(reply.text.len(), 1024);

    let err = client
        .call_as::<EchoResponse>(&ctx, &EchoRequest::new(2, format!("{text}a")))
        .expect_err("one byte over the string limit should fail");
    assert!(!err.is_recoverable());

    handle.stop().expect("server should stop");
}
