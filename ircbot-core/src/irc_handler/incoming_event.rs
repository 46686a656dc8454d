use crate::transport::WhoisInfo;

/// The IRC events the bot reacts to. Each is emitted on the bot's emitter under [`IncomingEvent::name`].
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingEvent {
    /// Registration with the server completed.
    Connect,
    Disconnect,
    Join { channel: String, nick: String },
    Part { channel: String, nick: String, message: Option<String> },
    Message { target: String, nick: String, text: String },
    Notice { target: String, nick: String, text: String },
    Nick { old: String, new: String },
    Quit { nick: String, message: Option<String> },
    Whois(WhoisInfo),
}

/// Every lifecycle event, by the name it is emitted under.
pub const LIFECYCLE: &[&str] = &["connect", "disconnect", "join", "part", "message", "notice", "nick", "quit", "whois"];

impl IncomingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            IncomingEvent::Connect => "connect",
            IncomingEvent::Disconnect => "disconnect",
            IncomingEvent::Join { .. } => "join",
            IncomingEvent::Part { .. } => "part",
            IncomingEvent::Message { .. } => "message",
            IncomingEvent::Notice { .. } => "notice",
            IncomingEvent::Nick { .. } => "nick",
            IncomingEvent::Quit { .. } => "quit",
            IncomingEvent::Whois(_) => "whois",
        }
    }
}

/// Parses one raw protocol line, e.g. `:nick!user@host PRIVMSG #channel :hello`. Lines the bot has
/// no use for are rejected.
impl TryFrom<&str> for IncomingEvent {
    type Error = ();

    fn try_from(line: &str) -> Result<Self, ()> {
        let (source, command, params) = split_line(line).ok_or(())?;
        let nick = source.map(|s| s.split_once('!').map_or(s, |(nick, _)| nick).to_owned());
        let param = |index: usize| params.get(index).map(|p| (*p).to_owned());

        match (command.to_ascii_uppercase().as_str(), nick) {
            ("001", _) => Ok(IncomingEvent::Connect),
            ("ERROR", _) => Ok(IncomingEvent::Disconnect),
            ("JOIN", Some(nick)) => Ok(IncomingEvent::Join { channel: param(0).ok_or(())?, nick }),
            ("PART", Some(nick)) => Ok(IncomingEvent::Part {
                channel: param(0).ok_or(())?,
                nick,
                message: param(1),
            }),
            ("PRIVMSG", Some(nick)) => Ok(IncomingEvent::Message {
                target: param(0).ok_or(())?,
                nick,
                text: param(1).ok_or(())?,
            }),
            ("NOTICE", Some(nick)) => Ok(IncomingEvent::Notice {
                target: param(0).ok_or(())?,
                nick,
                text: param(1).ok_or(())?,
            }),
            ("NICK", Some(old)) => Ok(IncomingEvent::Nick { old, new: param(0).ok_or(())? }),
            ("QUIT", Some(nick)) => Ok(IncomingEvent::Quit { nick, message: param(0) }),
            // RPL_WHOISUSER: <me> <nick> <user> <host> * :<realname>
            ("311", _) => Ok(IncomingEvent::Whois(WhoisInfo {
                nick: param(1).ok_or(())?,
                username: param(2),
                hostname: param(3),
                realname: param(5),
                ..Default::default()
            })),
            _ => Err(()),
        }
    }
}

/// Splits a line into its source, command and parameters. The trailing parameter keeps its spaces.
fn split_line(line: &str) -> Option<(Option<&str>, &str, Vec<&str>)> {
    let mut rest = line.trim_end_matches(['\r', '\n']);

    let source = match rest.strip_prefix(':') {
        Some(stripped) => {
            let (source, after) = stripped.split_once(' ')?;
            rest = after;
            Some(source)
        },
        None => None,
    };

    let rest = rest.trim_start_matches(' ');
    let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
    if command.is_empty() {
        return None;
    }

    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            break;
        }
        let (param, after) = rest.split_once(' ').unwrap_or((rest, ""));
        params.push(param);
        rest = after;
    }

    Some((source, command, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_messages() {
        assert_eq!(
            IncomingEvent::try_from(":alice!a@example.org PRIVMSG #rust :!echo  two  spaces\r\n"),
            Ok(IncomingEvent::Message {
                target: "#rust".to_owned(),
                nick: "alice".to_owned(),
                text: "!echo  two  spaces".to_owned(),
            })
        );
        assert_eq!(
            IncomingEvent::try_from(":bob NICK :robert"),
            Ok(IncomingEvent::Nick { old: "bob".to_owned(), new: "robert".to_owned() })
        );
        assert_eq!(
            IncomingEvent::try_from(":bob!b@h QUIT"),
            Ok(IncomingEvent::Quit { nick: "bob".to_owned(), message: None })
        );
        assert_eq!(IncomingEvent::try_from(":irc.example.org 001 ircbot :Welcome"), Ok(IncomingEvent::Connect));
    }

    #[test]
    fn parses_whois_user_reply() {
        let event = IncomingEvent::try_from(":irc.example.org 311 ircbot Alice alice host.example * :Alice A").unwrap();
        let IncomingEvent::Whois(info) = event else {
            panic!("expected whois, got {event:?}");
        };
        assert_eq!(info.nick, "Alice");
        assert_eq!(info.hostname.as_deref(), Some("host.example"));
        assert_eq!(info.realname.as_deref(), Some("Alice A"));
    }

    #[test]
    fn rejects_what_it_does_not_handle() {
        assert_eq!(IncomingEvent::try_from("PING :irc.example.org"), Err(()));
        assert_eq!(IncomingEvent::try_from("PRIVMSG #rust :no source"), Err(()));
        assert_eq!(IncomingEvent::try_from(""), Err(()));
    }

    #[test]
    fn names_match_lifecycle_table() {
        let events = [
            IncomingEvent::Connect,
            IncomingEvent::Disconnect,
            IncomingEvent::Join { channel: String::new(), nick: String::new() },
            IncomingEvent::Part { channel: String::new(), nick: String::new(), message: None },
            IncomingEvent::Message { target: String::new(), nick: String::new(), text: String::new() },
            IncomingEvent::Notice { target: String::new(), nick: String::new(), text: String::new() },
            IncomingEvent::Nick { old: String::new(), new: String::new() },
            IncomingEvent::Quit { nick: String::new(), message: None },
            IncomingEvent::Whois(WhoisInfo::default()),
        ];
        let names: Vec<&str> = events.iter().map(IncomingEvent::name).collect();
        assert_eq!(names, LIFECYCLE);
    }
}
