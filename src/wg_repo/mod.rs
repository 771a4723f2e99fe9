// WireGuard interface registry via the `wg` (or `awg`) command line tool

mod dump;

pub use dump::{WgPeer, parse_dump, vpn_ip};

use anyhow::Context;
use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::instrument;

/// Hard limit for a single tool invocation.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Query/control access to live WireGuard interfaces.
#[async_trait::async_trait]
pub trait WgTool: Send + Sync {
    /// Names of the interfaces that are currently up.
    async fn list_interfaces(&self) -> anyhow::Result<Vec<String>>;

    /// Peers of one interface with their live handshake/endpoint data.
    async fn dump(&self, interface: &str) -> anyhow::Result<Vec<WgPeer>>;

    async fn set_persistent_keepalive(
        &self,
        interface: &str,
        public_key: &str,
        seconds: u64,
    ) -> anyhow::Result<()>;
}

/// Only alphanumerics, '-', '_' and '.', at most 15 bytes (IFNAMSIZ - 1).
pub fn validate_interface_name(name: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!name.is_empty(), "interface name cannot be empty");
    anyhow::ensure!(
        name.len() <= 15,
        "interface name too long: '{}' ({} bytes, max 15)",
        name,
        name.len()
    );
    anyhow::ensure!(
        name.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'),
        "interface name contains invalid characters: '{}'",
        name
    );
    Ok(())
}

pub struct WgCli {
    command: String,
}

impl WgCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = timeout(
            COMMAND_TIMEOUT,
            Command::new(&self.command)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .with_context(|| format!("{} {} timed out", self.command, args.join(" ")))?
        .with_context(|| format!("failed to execute {}", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {} failed: {}",
                self.command,
                args.join(" "),
                stderr.trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl WgTool for WgCli {
    #[instrument(skip(self), fields(repo = "wg", operation = "list_interfaces"))]
    async fn list_interfaces(&self) -> anyhow::Result<Vec<String>> {
        let out = self.run(&["show", "interfaces"]).await?;
        Ok(out.split_whitespace().map(str::to_string).collect())
    }

    #[instrument(skip(self), fields(repo = "wg", operation = "dump"))]
    async fn dump(&self, interface: &str) -> anyhow::Result<Vec<WgPeer>> {
        validate_interface_name(interface)?;
        let out = self.run(&["show", interface, "dump"]).await?;
        Ok(parse_dump(&out))
    }

    #[instrument(skip(self, public_key), fields(repo = "wg", operation = "set_persistent_keepalive"))]
    async fn set_persistent_keepalive(
        &self,
        interface: &str,
        public_key: &str,
        seconds: u64,
    ) -> anyhow::Result<()> {
        validate_interface_name(interface)?;
        let secs = seconds.to_string();
        self.run(&[
            "set",
            interface,
            "peer",
            public_key,
            "persistent-keepalive",
            &secs,
        ])
        .await?;
        Ok(())
    }
}
