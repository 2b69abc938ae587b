//! Operator commands read from stdin

use ocpp_station::{Availability, ConnectorStatus, MeterValueFormat, StationCommand};

pub const HELP: &str = "\
Commands:
  start <connector> <tag>          start a transaction
  stop <connector>                 stop the connector's transaction
  authorize <tag>                  send Authorize
  availability <connector> <operative|inoperative>
  status <connector> <status>      force a connector status
  meter <connector> <wh>           set the meter reading
  send <connector>                 send a meter value now
  auto <connector> <secs> <wh>     start automatic meter values
  noauto <connector>               stop automatic meter values
  format <detailed|simple>         meter value layout
  heartbeat <secs>                 restart the heartbeat (0 stops it)
  connect | disconnect | reset
  help | quit";

#[derive(Debug, PartialEq)]
pub enum Input {
    Command(StationCommand),
    Help,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> Result<Input, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(Input::Empty);
    };

    let command = match (verb.to_lowercase().as_str(), args) {
        ("help" | "?", []) => return Ok(Input::Help),
        ("quit" | "exit", []) => return Ok(Input::Quit),
        ("connect", []) => StationCommand::Connect,
        ("disconnect", []) => StationCommand::Disconnect,
        ("reset", []) => StationCommand::Reset,
        ("start", [connector, tag]) => StationCommand::StartTransaction {
            connector_id: number(connector)?,
            id_tag: tag.to_string(),
        },
        ("stop", [connector]) => StationCommand::StopTransaction {
            connector_id: number(connector)?,
        },
        ("authorize", [tag]) => StationCommand::Authorize {
            id_tag: tag.to_string(),
        },
        ("availability", [connector, availability]) => StationCommand::SetAvailability {
            connector_id: number(connector)?,
            availability: availability.parse::<Availability>()?,
        },
        ("status", [connector, status]) => StationCommand::UpdateStatus {
            connector_id: number(connector)?,
            status: status.parse::<ConnectorStatus>()?,
        },
        ("meter", [connector, value]) => StationCommand::SetMeterValue {
            connector_id: number(connector)?,
            value: number(value)?,
        },
        ("send", [connector]) => StationCommand::SendMeterValue {
            connector_id: number(connector)?,
        },
        ("auto", [connector, interval, step]) => StationCommand::StartAutoMeterValue {
            connector_id: number(connector)?,
            interval: number(interval)?,
            step: number(step)?,
        },
        ("noauto", [connector]) => StationCommand::StopAutoMeterValue {
            connector_id: number(connector)?,
        },
        ("format", [format]) => {
            StationCommand::SetMeterValueFormat(format.parse::<MeterValueFormat>()?)
        }
        ("heartbeat", ["0"]) => StationCommand::StopHeartbeat,
        ("heartbeat", [period]) => StationCommand::StartHeartbeat {
            period: number(period)?,
        },
        _ => return Err(format!("unrecognised command: {} (try `help`)", line.trim())),
    };
    Ok(Input::Command(command))
}

fn number<T: std::str::FromStr>(word: &str) -> Result<T, String> {
    word.parse()
        .map_err(|_| format!("expected a non-negative number, got {}", word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> StationCommand {
        match parse_line(line) {
            Ok(Input::Command(command)) => command,
            other => panic!("{:?} parsed as {:?}", line, other),
        }
    }

    #[test]
    fn parses_transaction_commands() {
        assert_eq!(
            command("start 1 TAG-1"),
            StationCommand::StartTransaction {
                connector_id: 1,
                id_tag: "TAG-1".into()
            }
        );
        assert_eq!(command("STOP 2"), StationCommand::StopTransaction { connector_id: 2 });
    }

    #[test]
    fn parses_typed_arguments() {
        assert_eq!(
            command("availability 1 inoperative"),
            StationCommand::SetAvailability {
                connector_id: 1,
                availability: Availability::Inoperative
            }
        );
        assert_eq!(
            command("status 1 charging"),
            StationCommand::UpdateStatus {
                connector_id: 1,
                status: ConnectorStatus::Charging
            }
        );
        assert_eq!(
            command("format simple"),
            StationCommand::SetMeterValueFormat(MeterValueFormat::Simple)
        );
        assert_eq!(
            command("auto 1 10 100"),
            StationCommand::StartAutoMeterValue {
                connector_id: 1,
                interval: 10,
                step: 100
            }
        );
    }

    #[test]
    fn heartbeat_zero_stops() {
        assert_eq!(command("heartbeat 0"), StationCommand::StopHeartbeat);
        assert_eq!(command("heartbeat 30"), StationCommand::StartHeartbeat { period: 30 });
    }

    #[test]
    fn control_words() {
        assert_eq!(parse_line("   "), Ok(Input::Empty));
        assert_eq!(parse_line("help"), Ok(Input::Help));
        assert_eq!(parse_line("quit"), Ok(Input::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_line("meter 1 lots").is_err());
        assert!(parse_line("stop -1").is_err());
        assert!(parse_line("start 1").is_err());
        assert!(parse_line("status 1 sleeping").is_err());
        assert!(parse_line("fly").is_err());
    }
}
