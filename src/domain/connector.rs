//! Connector domain entity

use std::fmt;
use std::str::FromStr;

use super::transaction::Transaction;

/// Operational status of a connector (and of the station as a whole)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectorStatus {
    Available,
    Preparing,
    Charging,
    SuspendedEVSE,
    SuspendedEV,
    Finishing,
    Reserved,
    #[default]
    Unavailable,
    Faulted,
}

/// Station-level status uses the same vocabulary as connectors.
pub type StationStatus = ConnectorStatus;

impl ConnectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Preparing => "Preparing",
            Self::Charging => "Charging",
            Self::SuspendedEVSE => "SuspendedEVSE",
            Self::SuspendedEV => "SuspendedEV",
            Self::Finishing => "Finishing",
            Self::Reserved => "Reserved",
            Self::Unavailable => "Unavailable",
            Self::Faulted => "Faulted",
        }
    }
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "preparing" => Ok(Self::Preparing),
            "charging" => Ok(Self::Charging),
            "suspendedevse" => Ok(Self::SuspendedEVSE),
            "suspendedev" => Ok(Self::SuspendedEV),
            "finishing" => Ok(Self::Finishing),
            "reserved" => Ok(Self::Reserved),
            "unavailable" => Ok(Self::Unavailable),
            "faulted" => Ok(Self::Faulted),
            other => Err(format!("unknown connector status: {}", other)),
        }
    }
}

/// Administrative availability, independent of [`ConnectorStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Operative,
    Inoperative,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operative => write!(f, "Operative"),
            Self::Inoperative => write!(f, "Inoperative"),
        }
    }
}

impl FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "operative" => Ok(Self::Operative),
            "inoperative" => Ok(Self::Inoperative),
            other => Err(format!("unknown availability: {}", other)),
        }
    }
}

/// One outlet of the station
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    id: u32,
    pub status: ConnectorStatus,
    pub availability: Availability,
    /// Cumulative energy delivered (Wh)
    pub meter_value: u64,
    pub transaction: Option<Transaction>,
    /// Server-assigned id of the current transaction
    pub transaction_id: Option<i32>,
}

impl Connector {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            status: ConnectorStatus::default(),
            availability: Availability::default(),
            meter_value: 0,
            transaction: None,
            transaction_id: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Attach a new transaction, detaching whatever was there before.
    pub fn attach_transaction(&mut self, transaction: Transaction) -> Option<Transaction> {
        self.transaction_id = None;
        self.transaction.replace(transaction)
    }

    /// Transaction that has started and not yet been stopped.
    pub fn active_transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref().filter(|tx| tx.is_active())
    }

    /// Server id of the active transaction, once the server has assigned one.
    pub fn active_transaction_id(&self) -> Option<i32> {
        self.active_transaction()
            .and(self.transaction_id)
            .filter(|id| *id != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connector_defaults() {
        let connector = Connector::new(3);
        assert_eq!(connector.id(), 3);
        assert_eq!(connector.status, ConnectorStatus::Unavailable);
        assert_eq!(connector.availability, Availability::Operative);
        assert_eq!(connector.meter_value, 0);
        assert!(connector.transaction.is_none());
    }

    #[test]
    fn attach_replaces_previous_transaction() {
        let mut connector = Connector::new(1);
        connector.attach_transaction(Transaction::new(1, "A"));
        connector.transaction_id = Some(7);

        let previous = connector.attach_transaction(Transaction::new(1, "B"));

        assert_eq!(previous.map(|tx| tx.tag_id), Some("A".to_string()));
        assert_eq!(connector.transaction.as_ref().map(|tx| tx.tag_id.as_str()), Some("B"));
        assert_eq!(connector.transaction_id, None);
    }

    #[test]
    fn active_transaction_id_requires_running_transaction() {
        let mut connector = Connector::new(1);
        connector.attach_transaction(Transaction::new(1, "TAG"));
        assert_eq!(connector.active_transaction_id(), None);

        connector.transaction_id = Some(42);
        assert_eq!(connector.active_transaction_id(), Some(42));

        if let Some(tx) = connector.transaction.as_mut() {
            tx.stop(100);
        }
        assert_eq!(connector.active_transaction_id(), None);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("suspendedEVSE".parse::<ConnectorStatus>(), Ok(ConnectorStatus::SuspendedEVSE));
        assert_eq!("Available".parse::<ConnectorStatus>(), Ok(ConnectorStatus::Available));
        assert!("Idle".parse::<ConnectorStatus>().is_err());
        assert_eq!("INOPERATIVE".parse::<Availability>(), Ok(Availability::Inoperative));
    }
}
