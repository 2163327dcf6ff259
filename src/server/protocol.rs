/// Pipe-delimited request lines
use crate::domain::{Department, DisasterDetails, DisasterType, NewReport, ResponseStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login {
        username: String,
        password: String,
        role: String,
    },
    AddReport(NewReport),
    GetReports,
    UpdateReport {
        id: i64,
        field: String,
        value: String,
    },
    AssignDepartments {
        id: i64,
        selected: Vec<Department>,
    },
    UpdateStatus {
        id: i64,
        department: Department,
        status: ResponseStatus,
    },
    UpdateSubStatus {
        id: i64,
        department: Department,
        status: ResponseStatus,
    },
    AddLog {
        id: i64,
        actor: String,
        text: String,
    },
    AddResource {
        id: i64,
        text: String,
    },
    GetActive(Department),
    Priority(i64),
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Unknown,
    InvalidArguments,
}

impl ParseError {
    pub fn reply(&self) -> &'static str {
        match self {
            ParseError::Unknown => "Unknown command",
            ParseError::InvalidArguments => "INVALID_ARGUMENTS",
        }
    }
}

struct Args<'a> {
    parts: Vec<&'a str>,
}

impl<'a> Args<'a> {
    fn at(&self, i: usize) -> Result<&'a str, ParseError> {
        self.parts.get(i).copied().ok_or(ParseError::InvalidArguments)
    }

    fn id(&self, i: usize) -> Result<i64, ParseError> {
        self.at(i)?
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidArguments)
    }

    fn department(&self, i: usize) -> Result<Department, ParseError> {
        self.at(i)?.parse().map_err(|_| ParseError::InvalidArguments)
    }

    fn status(&self, i: usize) -> Result<ResponseStatus, ParseError> {
        self.at(i)?.parse().map_err(|_| ParseError::InvalidArguments)
    }

    /// Everything from `i` on, so free text may itself contain `|`
    fn rest(&self, i: usize) -> Result<String, ParseError> {
        if i >= self.parts.len() {
            return Err(ParseError::InvalidArguments);
        }
        Ok(self.parts[i..].join("|"))
    }
}

/// Parse one request line. The command word is case-sensitive.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let args = Args {
        parts: line.split('|').collect(),
    };

    let command = match args.at(0)? {
        "LOGIN" => Command::Login {
            username: args.at(1)?.to_string(),
            password: args.at(2)?.to_string(),
            role: args.at(3)?.to_string(),
        },
        "ADD_REPORT" => {
            let kind = DisasterType::from_label(args.at(1)?);
            let extra = args.parts.get(6..).unwrap_or(&[]);
            Command::AddReport(NewReport {
                details: DisasterDetails::from_positional(kind, extra),
                location: args.at(2)?.to_string(),
                latitude: 0.0,
                longitude: 0.0,
                date_time: args.at(3)?.to_string(),
                reporter_name: args.at(4)?.to_string(),
                contact_info: args.at(5)?.to_string(),
            })
        }
        "GET_REPORTS" => Command::GetReports,
        "UPDATE_REPORT" => Command::UpdateReport {
            id: args.id(1)?,
            field: args.at(2)?.trim().to_string(),
            value: args.rest(3)?,
        },
        "ASSIGN_DEPARTMENTS" => {
            let id = args.id(1)?;
            let selected = args
                .parts
                .get(2)
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| s.parse::<Department>())
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()
                .map_err(|_| ParseError::InvalidArguments)?
                .unwrap_or_default();
            Command::AssignDepartments { id, selected }
        }
        "UPDATE_STATUS" => Command::UpdateStatus {
            id: args.id(1)?,
            department: args.department(2)?,
            status: args.status(3)?,
        },
        "UPDATE_SUB_STATUS" => Command::UpdateSubStatus {
            id: args.id(1)?,
            department: args.department(2)?,
            status: args.status(3)?,
        },
        "ADD_LOG" => Command::AddLog {
            id: args.id(1)?,
            actor: args.at(2)?.to_string(),
            text: args.rest(3)?,
        },
        "ADD_RESOURCE" => Command::AddResource {
            id: args.id(1)?,
            text: args.rest(2)?,
        },
        "GET_ACTIVE" => Command::GetActive(args.department(1)?),
        "PRIORITY" => Command::Priority(args.id(1)?),
        "EXIT" => Command::Exit,
        _ => return Err(ParseError::Unknown),
    };
    Ok(command)
}
