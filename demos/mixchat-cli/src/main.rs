use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mixchat::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HELP: &str = "\
commands:
  /peers          refresh the directory
  /to <n>         talk to peer n from the last listing
  /alias ...      manage aliases, see /alias help
  /close          close the connection
  /reopen         connect again after a close
  /help           show this help
anything else is sent as a message";

const ALIAS_USAGE: &str = "\
/alias:
  /alias add <name>
  /alias add <b64_public_key> <b64_provider_public_key> <name>
  /alias remove
  /alias remove <b64_public_key> <b64_provider_public_key>
  /alias remove all
  /alias show
  /alias show <name>
  /alias show all";

const NO_RECIPIENT: &str = "choose a recipient first with /to <n>";

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Terminal chat over a local mix-network relay
#[derive(Parser, Debug)]
#[command(name = "mixchat", version)]
struct Cli {
    /// Relay host
    #[arg(long, env = "MIXCHAT_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Relay port
    #[arg(long, env = "MIXCHAT_PORT", default_value_t = 9000)]
    port: u16,

    /// Connect with wss:// instead of ws://
    #[arg(long)]
    secure: bool,

    /// Milliseconds between fetches
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// JSON file to keep aliases in; without it they last one session
    #[arg(long, env = "MIXCHAT_ALIASES")]
    aliases: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum AliasCommand {
    Add { name: String },
    AddFor { public_key: Key, provider_public_key: Key, name: String },
    Remove,
    RemoveFor { public_key: Key, provider_public_key: Key },
    RemoveAll,
    Show,
    ShowNamed(String),
    ShowAll,
}

impl AliasCommand {
    fn changes_book(&self) -> bool {
        !matches!(self, Self::Show | Self::ShowNamed(_) | Self::ShowAll)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Peers,
    To(usize),
    Alias(AliasCommand),
    Close,
    Reopen,
    Help,
    Text(String),
    Invalid(String),
}

/// Parses one stdin line. Blank lines yield `None`.
fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Input::Text(line.to_string()));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let input = match (name, arg) {
        ("peers", "") => Input::Peers,
        ("to", n) => match n.parse() {
            Ok(index) => Input::To(index),
            Err(_) => Input::Invalid(format!("/to needs a peer number, got {n:?}")),
        },
        ("alias", args) => parse_alias(args),
        ("close", "") => Input::Close,
        ("reopen", "") => Input::Reopen,
        ("help", _) => Input::Help,
        _ => Input::Invalid(format!("unknown command /{name}, try /help")),
    };
    Some(input)
}

/// Arguments are whitespace-separated, so names are single words.
fn parse_alias(args: &str) -> Input {
    let words: Vec<&str> = args.split_whitespace().collect();
    let command = match words.as_slice() {
        ["add", name] => AliasCommand::Add {
            name: name.to_string(),
        },
        ["add", public_key, provider_public_key, name] => AliasCommand::AddFor {
            public_key: Key::new(*public_key),
            provider_public_key: Key::new(*provider_public_key),
            name: name.to_string(),
        },
        ["remove"] => AliasCommand::Remove,
        ["remove", "all"] => AliasCommand::RemoveAll,
        ["remove", public_key, provider_public_key] => AliasCommand::RemoveFor {
            public_key: Key::new(*public_key),
            provider_public_key: Key::new(*provider_public_key),
        },
        ["show"] => AliasCommand::Show,
        ["show", "all"] => AliasCommand::ShowAll,
        ["show", name] => AliasCommand::ShowNamed(name.to_string()),
        _ => return Input::Invalid(ALIAS_USAGE.to_string()),
    };
    Input::Alias(command)
}

// ---------------------------------------------------------------------------
// Screen state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Screen {
    aliases: AliasBook,
    alias_file: Option<PathBuf>,
    recipient: Option<PeerIdentity>,
}

impl Screen {
    /// Starts from the alias file if one is configured.
    fn load(alias_file: Option<PathBuf>) -> Result<Self, AliasError> {
        let aliases = match &alias_file {
            Some(path) => AliasBook::load(path)?,
            None => AliasBook::new(),
        };
        Ok(Self {
            aliases,
            alias_file,
            recipient: None,
        })
    }

    /// Runs one alias command and returns what to print. Changes are
    /// written through to the alias file.
    fn run_alias(&mut self, command: AliasCommand) -> Result<String, AliasError> {
        let changes_book = command.changes_book();
        let output = match command {
            AliasCommand::Add { name } => {
                let Some(peer) = &self.recipient else {
                    return Ok(NO_RECIPIENT.to_string());
                };
                self.aliases.assign_peer(peer, name.as_str())?;
                format!("{} is now {name}", peer.label())
            }
            AliasCommand::AddFor {
                public_key,
                provider_public_key,
                name,
            } => {
                self.aliases
                    .assign(public_key.clone(), provider_public_key, name.as_str())?;
                format!("{public_key} is now {name}")
            }
            AliasCommand::Remove => {
                let Some(peer) = &self.recipient else {
                    return Ok(NO_RECIPIENT.to_string());
                };
                removed(self.aliases.remove(&peer.public_key, &peer.provider.public_key))
            }
            AliasCommand::RemoveFor {
                public_key,
                provider_public_key,
            } => removed(self.aliases.remove(&public_key, &provider_public_key)),
            AliasCommand::RemoveAll => {
                format!("removed {} aliases", self.aliases.clear())
            }
            AliasCommand::Show => {
                let Some(peer) = &self.recipient else {
                    return Ok(NO_RECIPIENT.to_string());
                };
                self.aliases
                    .entry(&peer.public_key, &peer.provider.public_key)
                    .to_string()
            }
            AliasCommand::ShowNamed(name) => {
                list(self.aliases.find_by_name(&name), &format!("no peers with alias {name}"))
            }
            AliasCommand::ShowAll => list(self.aliases.all(), "no aliases assigned"),
        };

        if changes_book {
            if let Some(path) = &self.alias_file {
                self.aliases.save(path)?;
            }
        }
        Ok(output)
    }

    fn name_of(&self, peer: &PeerIdentity) -> String {
        self.aliases
            .display_name(&peer.public_key, &peer.provider.public_key)
    }

    /// Turns an engine event into the lines to print.
    fn render(&self, event: &Event) -> String {
        match event {
            Event::DirectoryUpdated(peers) if peers.is_empty() => {
                "no peers online".to_string()
            }
            Event::DirectoryUpdated(peers) => peers
                .iter()
                .enumerate()
                .map(|(i, peer)| format!("[{i}] {}  {}", self.name_of(peer), peer.label()))
                .collect::<Vec<_>>()
                .join("\n"),
            Event::OwnIdentityKnown(me) => format!("you are {}", me.label()),
            Event::MessageReceived(msg) => format!(
                "{}: {}",
                self.aliases.display_name(
                    &msg.sender_public_key,
                    &msg.sender_provider_public_key
                ),
                msg.content
            ),
            Event::MessageSent { message, recipient } => {
                format!("You -> {}: {}", self.name_of(recipient), message.content)
            }
            Event::ConnectionClosed { code, reason } => {
                format!("connection closed ({code}) {reason}; /reopen to reconnect")
            }
            Event::DecodeWarning { reason, .. } => {
                format!("! dropped an undecodable response: {reason}")
            }
            Event::TransportError(error) => format!("! transport error: {error}"),
        }
    }
}

fn removed(name: Option<String>) -> String {
    match name {
        Some(name) => format!("removed alias {name}"),
        None => "no alias set".to_string(),
    }
}

fn list(aliases: Vec<Alias>, empty: &str) -> String {
    if aliases.is_empty() {
        return empty.to_string();
    }
    aliases
        .iter()
        .map(Alias::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

async fn handle_input(client: &mut MixClient, screen: &mut Screen, input: Input) {
    let result = match input {
        Input::Peers => client.handle().refresh_directory().await,
        Input::To(index) => match client.handle().choose_recipient(index).await {
            Ok(peer) => {
                println!("talking to {}", screen.name_of(&peer));
                screen.recipient = Some(peer);
                Ok(())
            }
            Err(e) => Err(e),
        },
        Input::Alias(command) => {
            match screen.run_alias(command) {
                Ok(output) => println!("{output}"),
                Err(e) => println!("! {e}"),
            }
            Ok(())
        }
        Input::Close => {
            client.close().await;
            Ok(())
        }
        Input::Reopen => client.reopen().map(|_| {
            screen.recipient = None;
        }),
        Input::Help => {
            println!("{HELP}");
            Ok(())
        }
        Input::Text(text) => match client.handle().send_text(text).await {
            Ok(SendOutcome::Sent) => Ok(()),
            Ok(SendOutcome::NoRecipient) => {
                println!("no recipient yet; use /peers and /to <n>");
                Ok(())
            }
            Ok(SendOutcome::IdentityPending) => {
                println!("still waiting for the relay to report your identity");
                Ok(())
            }
            Err(e) => Err(e),
        },
        Input::Invalid(message) => {
            println!("{message}");
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("! {e}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::builder()
        .host(cli.host)
        .port(cli.port)
        .secure(cli.secure)
        .poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .build()?;

    tracing::info!(endpoint = %config.endpoint()?, "starting mixchat");
    let mut screen = Screen::load(cli.aliases)?;
    let (mut client, mut events) = MixClient::connect(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    loop {
        tokio::select! {
            Some(event) = events.recv() => println!("{}", screen.render(&event)),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Some(input) = parse_input(&line) {
                    handle_input(&mut client, &mut screen, input).await;
                }
            }
        }
    }

    client.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(public_key: &str) -> PeerIdentity {
        PeerIdentity {
            id: Key::new(public_key),
            public_key: Key::new(public_key),
            provider: ProviderIdentity {
                id: Key::new("UA=="),
                host: "127.0.0.1".into(),
                port: "1789".into(),
                public_key: Key::new("UHJvdmlkZXI="),
            },
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("/peers"), Some(Input::Peers));
        assert_eq!(parse_input("  /to 2 "), Some(Input::To(2)));
        assert_eq!(parse_input("/close"), Some(Input::Close));
        assert_eq!(parse_input("/reopen"), Some(Input::Reopen));
        assert_eq!(parse_input("/help"), Some(Input::Help));
    }

    #[test]
    fn test_parse_alias_commands() {
        let alias = |line: &str| match parse_input(line) {
            Some(Input::Alias(command)) => command,
            other => panic!("{line:?} parsed as {other:?}"),
        };

        assert_eq!(alias("/alias add bob"), AliasCommand::Add { name: "bob".into() });
        assert_eq!(
            alias("/alias add Qm9i UA== bob"),
            AliasCommand::AddFor {
                public_key: Key::new("Qm9i"),
                provider_public_key: Key::new("UA=="),
                name: "bob".into(),
            }
        );
        assert_eq!(alias("/alias remove"), AliasCommand::Remove);
        assert_eq!(alias("/alias remove all"), AliasCommand::RemoveAll);
        assert_eq!(
            alias("/alias remove Qm9i UA=="),
            AliasCommand::RemoveFor {
                public_key: Key::new("Qm9i"),
                provider_public_key: Key::new("UA=="),
            }
        );
        assert_eq!(alias("/alias show"), AliasCommand::Show);
        assert_eq!(alias("/alias show all"), AliasCommand::ShowAll);
        assert_eq!(alias("/alias show bob"), AliasCommand::ShowNamed("bob".into()));
    }

    #[test]
    fn test_parse_alias_misuse_prints_usage() {
        for line in ["/alias", "/alias help", "/alias add", "/alias add a b", "/alias show a b"] {
            assert_eq!(parse_input(line), Some(Input::Invalid(ALIAS_USAGE.into())));
        }
    }

    #[test]
    fn test_parse_plain_text_and_blank() {
        assert_eq!(parse_input("hello /to"), Some(Input::Text("hello /to".into())));
        assert_eq!(parse_input("   "), None);
    }

    #[test]
    fn test_parse_bad_commands() {
        assert!(matches!(parse_input("/to two"), Some(Input::Invalid(_))));
        assert!(matches!(parse_input("/alias"), Some(Input::Invalid(_))));
        assert!(matches!(parse_input("/nope"), Some(Input::Invalid(_))));
    }

    #[test]
    fn test_render_directory_with_placeholder_names() {
        let screen = Screen::default();
        let out = screen.render(&Event::DirectoryUpdated(vec![peer("eqjn-P2hFQpo")]));
        assert_eq!(
            out,
            "[0] ??? - eqjn-P2h...  eqjn-P2hFQpo @[Provider] UHJvdmlkZXI="
        );
    }

    #[test]
    fn test_render_uses_aliases() {
        let mut screen = Screen::default();
        screen.aliases.assign_peer(&peer("Qm9i"), "bob").unwrap();

        let out = screen.render(&Event::MessageReceived(ChatMessage {
            content: "hey".into(),
            sender_public_key: Key::new("Qm9i"),
            sender_provider_public_key: Key::new("UHJvdmlkZXI="),
        }));
        assert_eq!(out, "bob: hey");
    }

    #[test]
    fn test_alias_commands_need_a_recipient() {
        let mut screen = Screen::default();
        for command in [AliasCommand::Add { name: "bob".into() }, AliasCommand::Remove, AliasCommand::Show] {
            assert_eq!(screen.run_alias(command).unwrap(), NO_RECIPIENT);
        }
        assert!(screen.aliases.is_empty());
    }

    #[test]
    fn test_alias_add_show_remove_for_recipient() {
        let mut screen = Screen::default();
        screen.recipient = Some(peer("Qm9i"));

        screen.run_alias(AliasCommand::Add { name: "bob".into() }).unwrap();
        assert_eq!(
            screen.run_alias(AliasCommand::Show).unwrap(),
            "Alias: bob - Public Key: Qm9i Provider's Public Key: UHJvdmlkZXI="
        );
        assert_eq!(
            screen.run_alias(AliasCommand::ShowNamed("bob".into())).unwrap(),
            "Alias: bob - Public Key: Qm9i Provider's Public Key: UHJvdmlkZXI="
        );

        assert_eq!(screen.run_alias(AliasCommand::Remove).unwrap(), "removed alias bob");
        assert_eq!(
            screen.run_alias(AliasCommand::Show).unwrap(),
            "Alias: <none> - Public Key: Qm9i Provider's Public Key: UHJvdmlkZXI="
        );
        assert_eq!(screen.run_alias(AliasCommand::ShowAll).unwrap(), "no aliases assigned");
    }

    #[test]
    fn test_alias_rejects_reserved_names_and_bad_keys() {
        let mut screen = Screen::default();
        screen.recipient = Some(peer("Qm9i"));

        assert!(matches!(
            screen.run_alias(AliasCommand::Add { name: "all".into() }),
            Err(AliasError::ReservedName(_))
        ));
        assert!(matches!(
            screen.run_alias(AliasCommand::AddFor {
                public_key: Key::new("not-base64!"),
                provider_public_key: Key::new("UA=="),
                name: "eve".into(),
            }),
            Err(AliasError::InvalidKey(_))
        ));
        assert!(screen.aliases.is_empty());
    }

    #[test]
    fn test_alias_changes_are_written_to_the_alias_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");

        let mut screen = Screen::load(Some(path.clone())).unwrap();
        screen
            .run_alias(AliasCommand::AddFor {
                public_key: Key::new("Qm9i"),
                provider_public_key: Key::new("UA=="),
                name: "bob".into(),
            })
            .unwrap();
        screen
            .run_alias(AliasCommand::AddFor {
                public_key: Key::new("QWxp"),
                provider_public_key: Key::new("UA=="),
                name: "ali".into(),
            })
            .unwrap();

        let reloaded = Screen::load(Some(path.clone())).unwrap();
        assert_eq!(reloaded.aliases.len(), 2);

        screen.run_alias(AliasCommand::RemoveAll).unwrap();
        assert!(Screen::load(Some(path)).unwrap().aliases.is_empty());
    }

    #[test]
    fn test_cli_reads_defaults() {
        let cli = Cli::try_parse_from(["mixchat"]).unwrap();
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.poll_interval_ms, 1000);
        assert!(!cli.secure);
    }
}
