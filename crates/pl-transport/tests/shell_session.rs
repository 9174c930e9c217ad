//! SSH shell transport against an in-process russh server
//!
//! The fake device accepts one password, records every command it is
//! asked to run, and answers `fail <stderr>` commands with exit status 1.

use async_trait::async_trait;
use parking_lot::Mutex;
use russh::server::{Auth, Handler, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use russh_keys::key::KeyPair;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use pl_core::config::{DeviceConfig, ShellCommands};
use pl_core::traits::ShellTransport;
use pl_core::{Credentials, TransportError};
use pl_transport::SshShell;

const PASSWORD: &str = "secret";
const TIMEOUT: Duration = Duration::from_secs(5);

type CommandLog = Arc<Mutex<Vec<String>>>;

struct FakeDevice {
    commands: CommandLog,
}

#[async_trait]
impl Handler for FakeDevice {
    type Error = russh::Error;

    async fn auth_password(&mut self, _user: &str, password: &str) -> Result<Auth, Self::Error> {
        if password == PASSWORD {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
            })
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let command = String::from_utf8_lossy(data).into_owned();
        self.commands.lock().push(command.clone());

        let status = if let Some(stderr) = command.strip_prefix("fail ") {
            session.extended_data(channel, 1, CryptoVec::from_slice(stderr.as_bytes()));
            1
        } else if let Some(text) = command.strip_prefix("echo ") {
            session.data(channel, CryptoVec::from_slice(format!("{}\n", text).as_bytes()));
            0
        } else {
            0
        };

        session.exit_status_request(channel, status);
        session.eof(channel);
        session.close(channel);
        Ok(())
    }
}

/// Start the fake device and return its port and command log
async fn fake_device() -> (u16, CommandLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let commands = CommandLog::default();

    let mut config = russh::server::Config::default();
    config.keys.push(KeyPair::generate_ed25519().unwrap());
    config.auth_rejection_time = Duration::from_millis(10);
    config.auth_rejection_time_initial = Some(Duration::ZERO);
    let config = Arc::new(config);

    let log = Arc::clone(&commands);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = FakeDevice {
                commands: Arc::clone(&log),
            };
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                let _ = russh::server::run_stream(config, stream, handler).await;
            });
        }
    });

    (port, commands)
}

fn shell(port: u16, bring_up: &str) -> SshShell {
    SshShell::from_config(&DeviceConfig {
        shell_port: port,
        shell_timeout: TIMEOUT,
        commands: ShellCommands {
            prepare: "stop-panel".to_string(),
            bring_up: bring_up.to_string(),
            teardown: "stop-panel --final".to_string(),
        },
        ..Default::default()
    })
}

fn credentials(password: &str) -> Credentials {
    Credentials::new("root", password)
}

#[tokio::test]
async fn test_connect_runs_prepare_then_bring_up() {
    let (port, commands) = fake_device().await;
    let shell = shell(port, "start-panel -r {rotation}");

    shell
        .connect("127.0.0.1", &credentials(PASSWORD), TIMEOUT)
        .await
        .unwrap();

    assert!(shell.is_connected().await);
    assert_eq!(
        *commands.lock(),
        vec!["stop-panel".to_string(), "start-panel -r 0".to_string()]
    );

    let output = shell.exec("echo ready").await.unwrap();
    assert!(output.success());
    assert_eq!(output.stdout, "ready\n");
}

#[tokio::test]
async fn test_failing_bring_up_closes_session() {
    let (port, commands) = fake_device().await;
    let shell = shell(port, "fail panel busy");

    let err = shell
        .connect("127.0.0.1", &credentials(PASSWORD), TIMEOUT)
        .await
        .unwrap_err();

    match err {
        TransportError::CommandFailed {
            command,
            status,
            stderr,
        } => {
            assert_eq!(command, "fail panel busy");
            assert_eq!(status, 1);
            assert_eq!(stderr, "panel busy");
        }
        other => panic!("expected CommandFailed, got {:?}", other),
    }
    assert!(!shell.is_connected().await);
    assert_eq!(commands.lock().len(), 2);
}

#[tokio::test]
async fn test_disconnect_runs_teardown() {
    let (port, commands) = fake_device().await;
    let shell = shell(port, "start-panel");

    shell
        .connect("127.0.0.1", &credentials(PASSWORD), TIMEOUT)
        .await
        .unwrap();
    shell.disconnect().await;

    assert!(!shell.is_connected().await);
    assert_eq!(
        commands.lock().last().map(String::as_str),
        Some("stop-panel --final")
    );

    // Second disconnect has no session and runs nothing
    shell.disconnect().await;
    assert_eq!(commands.lock().len(), 3);
}

#[tokio::test]
async fn test_wrong_password() {
    let (port, commands) = fake_device().await;
    let shell = shell(port, "start-panel");

    let result = shell
        .connect("127.0.0.1", &credentials("wrong"), TIMEOUT)
        .await;

    assert!(matches!(result, Err(TransportError::AuthenticationFailed)));
    assert!(!shell.is_connected().await);
    assert!(commands.lock().is_empty());
}
