use chumsky::prelude::*;
use std::fmt;

/// One parsed client command. Keywords are case-sensitive; table names, keys
/// and values are identifiers (`[A-Za-z0-9_]+`); whitespace between tokens
/// is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Make { table: String },
    Drop { table: String },
    Get { table: String, key: String },
    Put { table: String, key: String, value: String },
    Del { table: String, key: String },
    Stop,
}

impl Command {
    /// The table the command addresses, when it addresses one.
    pub fn table(&self) -> Option<&str> {
        match self {
            Command::Make { table }
            | Command::Drop { table }
            | Command::Get { table, .. }
            | Command::Put { table, .. }
            | Command::Del { table, .. } => Some(table),
            Command::Stop => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Make { table } => write!(f, "MAKE({table})"),
            Command::Drop { table } => write!(f, "DROP({table})"),
            Command::Get { table, key } => write!(f, "GET({table}, {key})"),
            Command::Put { table, key, value } => write!(f, "PUT({table}, {key}, {value})"),
            Command::Del { table, key } => write!(f, "DEL({table}, {key})"),
            Command::Stop => write!(f, "STOP()"),
        }
    }
}

/// Parses one command line.
pub fn parse_command(input: &str) -> Result<Command, Vec<Simple<char>>> {
    command_parser().parse(input)
}

fn command_parser() -> impl Parser<char, Command, Error = Simple<char>> {
    let ident = filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1)
        .collect::<String>()
        .padded();

    let lparen = just('(').padded();
    let rparen = just(')').padded();
    let comma = just(',').padded();

    let make = just("MAKE")
        .ignore_then(ident.clone().delimited_by(lparen.clone(), rparen.clone()))
        .map(|table| Command::Make { table });

    let drop = just("DROP")
        .ignore_then(ident.clone().delimited_by(lparen.clone(), rparen.clone()))
        .map(|table| Command::Drop { table });

    let get = just("GET")
        .ignore_then(
            ident
                .clone()
                .then_ignore(comma.clone())
                .then(ident.clone())
                .delimited_by(lparen.clone(), rparen.clone()),
        )
        .map(|(table, key)| Command::Get { table, key });

    let put = just("PUT")
        .ignore_then(
            ident
                .clone()
                .then_ignore(comma.clone())
                .then(ident.clone())
                .then_ignore(comma.clone())
                .then(ident.clone())
                .delimited_by(lparen.clone(), rparen.clone()),
        )
        .map(|((table, key), value)| Command::Put { table, key, value });

    let del = just("DEL")
        .ignore_then(
            ident
                .clone()
                .then_ignore(comma.clone())
                .then(ident)
                .delimited_by(lparen.clone(), rparen.clone()),
        )
        .map(|(table, key)| Command::Del { table, key });

    let stop = just("STOP")
        .ignore_then(lparen)
        .ignore_then(rparen)
        .to(Command::Stop);

    choice((make, drop, get, put, del, stop))
        .padded()
        .then_ignore(end())
}
