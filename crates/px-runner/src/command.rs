//! Line commands typed on stdin.

use px_core::Asset;

pub const HELP: &str = "\
commands:
  connect                 start the live feed
  disconnect              stop the live feed
  toggle                  connect if offline, otherwise disconnect
  refresh <ASSET|all>     re-fetch REST snapshots
  unsubscribe <channel>.. drop feed channels on the open connection
  show                    redraw the board
  help                    this text
  quit                    exit";

/// Which snapshots to re-fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTarget {
    All,
    One(Asset),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Toggle,
    Refresh(RefreshTarget),
    Unsubscribe(Vec<String>),
    Show,
    Help,
    Quit,
}

/// Parse one input line. Blank lines redraw the board.
pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(Command::Show);
    };
    let rest: Vec<&str> = words.collect();

    let cmd = match head.to_ascii_lowercase().as_str() {
        "connect" | "c" => Command::Connect,
        "disconnect" | "d" => Command::Disconnect,
        "toggle" | "t" => Command::Toggle,
        "refresh" | "r" => match rest.as_slice() {
            [] => Command::Refresh(RefreshTarget::All),
            [target] if target.eq_ignore_ascii_case("all") => Command::Refresh(RefreshTarget::All),
            [target] => {
                let asset = target.parse::<Asset>().map_err(|e| e.to_string())?;
                Command::Refresh(RefreshTarget::One(asset))
            }
            _ => return Err("usage: refresh <ASSET|all>".into()),
        },
        "unsubscribe" | "u" => {
            if rest.is_empty() {
                return Err("usage: unsubscribe <channel>..".into());
            }
            Command::Unsubscribe(rest.iter().map(|s| s.to_string()).collect())
        }
        "show" | "s" => Command::Show,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(cmd)
}
