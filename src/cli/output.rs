use crate::cli::args::OutputFormat;
use crate::core::dispatcher::{ClientDisposition, ClientReport, Outcome, Progress};
use crate::core::protocol::Response;
use crate::domain::error::QmiCtlError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{self, Write};
use tabled::builder::Builder;

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_outcome(&self, outcome: &Outcome) -> Result<(), OutputError>;
    fn write_progress(&self, device: &str, progress: &Progress) -> Result<(), OutputError>;
    fn write_error(&self, device: Option<&str>, error: &QmiCtlError) -> Result<(), OutputError>;
    fn write_version(&self) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for QmiCtlError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Something that can be printed as one result object.
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    Outcome(&'a Outcome),
    Progress(&'a str, &'a Progress),
    Error(Option<&'a str>, &'a QmiCtlError),
    Version,
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render without printing.
    pub fn render(&self, record: Record<'_>) -> Result<String, OutputError> {
        match self.format {
            OutputFormat::Json => render_json(&record_value(record)?, true),
            OutputFormat::Compact => render_json(&record_value(record)?, false),
            OutputFormat::Text => render_text(record),
        }
    }

    fn print(&self, record: Record<'_>) -> Result<(), OutputError> {
        let rendered = self.render(record)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", rendered)?;
        stdout.flush()?;
        Ok(())
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_outcome(&self, outcome: &Outcome) -> Result<(), OutputError> {
        self.print(Record::Outcome(outcome))
    }

    fn write_progress(&self, device: &str, progress: &Progress) -> Result<(), OutputError> {
        self.print(Record::Progress(device, progress))
    }

    fn write_error(&self, device: Option<&str>, error: &QmiCtlError) -> Result<(), OutputError> {
        self.print(Record::Error(device, error))
    }

    fn write_version(&self) -> Result<(), OutputError> {
        self.print(Record::Version)
    }
}

// ---------------------------------------------------------------------------
// JSON

/// Serialize with four space indentation, or on a single line.
pub fn render_json(value: &Value, pretty: bool) -> Result<String, OutputError> {
    if !pretty {
        return Ok(serde_json::to_string(value)?);
    }

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buffer)
        .map_err(|e| OutputError::IoError(io::Error::new(io::ErrorKind::InvalidData, e)))
}

pub fn record_value(record: Record<'_>) -> Result<Value, OutputError> {
    Ok(match record {
        Record::Outcome(outcome) => outcome_value(outcome)?,
        Record::Progress(device, progress) => progress_value(device, progress),
        Record::Error(device, error) => Value::Object(error_object(device, error)),
        Record::Version => version_value(),
    })
}

pub fn outcome_value(outcome: &Outcome) -> Result<Value, OutputError> {
    let mut object = match &outcome.result {
        Ok(response) => {
            let mut object = Map::new();
            object.insert("success".into(), Value::Bool(true));
            object.insert("device".into(), Value::String(outcome.device.clone()));
            object.extend(fields(response)?);
            object
        }
        Err(error) => error_object(Some(&outcome.device), error),
    };

    if let Some(client) = &outcome.client {
        match &client.disposition {
            ClientDisposition::Released => {}
            ClientDisposition::Retained => {
                let mut retained = Map::new();
                retained.insert("service".into(), Value::String(client.service.to_string()));
                retained.insert("cid".into(), Value::from(client.cid.value()));
                object.insert("client_retained".into(), Value::Object(retained));
            }
            ClientDisposition::ReleaseFailed(message) => {
                object.insert("release_error".into(), Value::String(message.clone()));
            }
        }
    }

    Ok(Value::Object(object))
}

/// Serialized fields of a response, without the ones the device did not report.
fn fields<T: Serialize + ?Sized>(response: &T) -> Result<Map<String, Value>, OutputError> {
    let mut value = serde_json::to_value(response)?;
    prune_nulls(&mut value);
    Ok(match value {
        Value::Object(fields) => fields,
        _ => Map::new(),
    })
}

/// Drop fields the device did not report.
pub fn prune_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, field| !field.is_null());
            map.values_mut().for_each(prune_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(prune_nulls),
        _ => {}
    }
}

fn error_object(device: Option<&str>, error: &QmiCtlError) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("success".into(), Value::Bool(false));
    object.insert("error".into(), Value::String(error.headline()));
    if let Some(message) = error.detail() {
        object.insert("message".into(), Value::String(message));
    }
    if let Some(device) = device {
        object.insert("device".into(), Value::String(device.to_string()));
    }
    if let QmiCtlError::Allocation { service, .. } = error {
        object.insert("service".into(), Value::String(service.to_string()));
    }
    if let Some(reason) = error.call_end_reason() {
        object.insert("call_end_reason".into(), Value::from(reason.code));
        object.insert("call_end_reason_text".into(), Value::String(reason.text.clone()));
        if let Some(verbose_type) = &reason.verbose_type {
            object.insert(
                "verbose_call_end_reason_type".into(),
                Value::String(verbose_type.clone()),
            );
        }
        if let Some(verbose_reason) = reason.verbose_reason {
            object.insert("verbose_call_end_reason".into(), Value::from(verbose_reason));
        }
    }
    object
}

pub fn progress_value(device: &str, progress: &Progress) -> Value {
    let mut object = Map::new();
    match progress {
        Progress::NetworkStarted {
            packet_data_handle,
            follow,
        } => {
            object.insert("success".into(), Value::Bool(true));
            object.insert("device".into(), Value::String(device.to_string()));
            object.insert("packet_data_handle".into(), Value::from(*packet_data_handle));
            object.insert("break_to_abort_network".into(), Value::Bool(*follow));
        }
        Progress::ConnectionStatus { status, stopping } => {
            object.insert("success".into(), Value::Bool(true));
            object.insert("device".into(), Value::String(device.to_string()));
            object.insert("connection_status".into(), Value::String(status.to_string()));
            object.insert("stopping".into(), Value::Bool(*stopping));
        }
        Progress::NetworkCancelled => {
            object.insert("success".into(), Value::Bool(true));
            object.insert("device".into(), Value::String(device.to_string()));
            object.insert(
                "message".into(),
                Value::String("network cancelled, releasing resources".to_string()),
            );
        }
        Progress::PollFailed { error, message } => {
            object.insert("success".into(), Value::Bool(false));
            object.insert("error".into(), Value::String(error.clone()));
            object.insert("message".into(), Value::String(message.clone()));
        }
    }
    Value::Object(object)
}

pub fn version_value() -> Value {
    let mut object = Map::new();
    object.insert("success".into(), Value::Bool(true));
    object.insert("program_name".into(), Value::String(env!("CARGO_PKG_NAME").to_string()));
    object.insert(
        "program_version".into(),
        Value::String(env!("CARGO_PKG_VERSION").to_string()),
    );
    object.insert("license".into(), Value::String(env!("CARGO_PKG_LICENSE").to_string()));
    Value::Object(object)
}

// ---------------------------------------------------------------------------
// Text

fn render_text(record: Record<'_>) -> Result<String, OutputError> {
    Ok(match record {
        Record::Outcome(outcome) => outcome_text(outcome)?,
        Record::Progress(device, progress) => progress_text(device, progress),
        Record::Error(_, error) => error_text(error),
        Record::Version => format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    })
}

fn outcome_text(outcome: &Outcome) -> Result<String, OutputError> {
    let mut lines = Vec::new();
    match &outcome.result {
        Ok(Response::Completed(done)) => {
            lines.push(format!("[{}] {}", outcome.device, done.message))
        }
        Ok(response) => {
            lines.push(format!("[{}] {}:", outcome.device, response.headline()));
            write_fields(&mut lines, &fields(response)?, 1);
        }
        Err(error) => lines.push(error_text(error)),
    }

    if let Some(client) = &outcome.client {
        client_text(&mut lines, &outcome.device, client);
    }
    Ok(lines.join("\n"))
}

fn client_text(lines: &mut Vec<String>, device: &str, client: &ClientReport) {
    match &client.disposition {
        ClientDisposition::Released => {}
        ClientDisposition::Retained => {
            lines.push(format!("[{}] Client ID not released:", device));
            lines.push(format!("\tService: '{}'", client.service));
            lines.push(format!("\t    CID: '{}'", client.cid));
        }
        ClientDisposition::ReleaseFailed(message) => lines.push(format!("error: {}", message)),
    }
}

fn error_text(error: &QmiCtlError) -> String {
    let mut text = match error.detail() {
        Some(message) => format!("error: {}: {}", error.headline(), message),
        None => format!("error: {}", error.headline()),
    };
    if let Some(reason) = error.call_end_reason() {
        text.push_str(&format!("\ncall end reason ({}): {}", reason.code, reason.text));
        if let (Some(verbose_type), Some(verbose_reason)) =
            (&reason.verbose_type, reason.verbose_reason)
        {
            text.push_str(&format!(
                "\nverbose call end reason ({}): {}",
                verbose_reason, verbose_type
            ));
        }
    }
    text
}

fn progress_text(device: &str, progress: &Progress) -> String {
    match progress {
        Progress::NetworkStarted {
            packet_data_handle,
            follow,
        } => {
            let mut text = format!(
                "[{}] Network started\n\tPacket data handle: '{}'",
                device, packet_data_handle
            );
            if *follow {
                text.push_str("\n\nCtrl+C will stop the network");
            }
            text
        }
        Progress::ConnectionStatus { status, stopping } => {
            let mut text = format!("[{}] Connection status: '{}'", device, status);
            if *stopping {
                text.push_str(&format!(
                    "\n[{}] Stopping after detecting disconnection",
                    device
                ));
            }
            text
        }
        Progress::NetworkCancelled => "Network cancelled... releasing resources".to_string(),
        Progress::PollFailed { error, message } => format!("error: {}: {}", error, message),
    }
}

/// `packet_data_handle` -> `Packet data handle`
fn label(key: &str) -> String {
    let words = key.replace('_', " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{}'", text),
        Value::Null => "'unknown'".to_string(),
        other => other.to_string(),
    }
}

fn is_flat_record(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.values().all(|field| !field.is_object() && !field.is_array()),
        _ => false,
    }
}

fn write_fields(lines: &mut Vec<String>, fields: &Map<String, Value>, depth: usize) {
    let indent = "\t".repeat(depth);
    for (key, value) in fields {
        match value {
            Value::Object(inner) => {
                lines.push(format!("{}{}:", indent, label(key)));
                write_fields(lines, inner, depth + 1);
            }
            Value::Array(items) if items.is_empty() => {
                lines.push(format!("{}{}: none", indent, label(key)));
            }
            Value::Array(items) if items.iter().all(is_flat_record) => {
                lines.push(format!("{}{}:", indent, label(key)));
                for row in table(items).lines() {
                    lines.push(format!("{}\t{}", indent, row));
                }
            }
            Value::Array(items)
                if items.iter().all(|item| !item.is_object() && !item.is_array()) =>
            {
                let joined: Vec<String> = items.iter().map(scalar).collect();
                lines.push(format!("{}{}: {}", indent, label(key), joined.join(", ")));
            }
            Value::Array(items) => {
                lines.push(format!("{}{}:", indent, label(key)));
                for (index, item) in items.iter().enumerate() {
                    lines.push(format!("{}\t[{}]", indent, index));
                    if let Value::Object(inner) = item {
                        write_fields(lines, inner, depth + 2);
                    }
                }
            }
            other => lines.push(format!("{}{}: {}", indent, label(key), scalar(other))),
        }
    }
}

/// Render a list of flat records as a table, one column per key.
fn table(items: &[Value]) -> String {
    let mut columns: Vec<&String> = Vec::new();
    for item in items {
        if let Value::Object(map) = item {
            for key in map.keys() {
                if !columns.contains(&key) {
                    columns.push(key);
                }
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|key| label(key)));
    for item in items {
        let row = columns.iter().map(|key| match item.get(key.as_str()) {
            Some(Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => String::new(),
        });
        builder.push_record(row);
    }
    builder.build().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::response::{Completed, HomeNetwork, ProfileList, ProfileSummary};
    use crate::core::protocol::{Cid, ProtocolError, QmiStatus, Service};
    use crate::domain::values::ProfileType;

    fn outcome(result: Result<Response, QmiCtlError>) -> Outcome {
        Outcome {
            device: "/dev/cdc-wdm0".to_string(),
            result,
            client: None,
            transitions: Vec::new(),
        }
    }

    fn home_network() -> Response {
        Response::HomeNetwork(HomeNetwork {
            mcc: 214,
            mnc: 7,
            description: "Movistar".to_string(),
            sid: None,
            nid: None,
        })
    }

    #[test]
    fn test_success_keys_in_order_without_nulls() {
        let value = outcome_value(&outcome(Ok(home_network()))).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["success", "device", "mcc", "mnc", "description"]);
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let writer = ConsoleWriter::new(OutputFormat::Json);
        let text = writer
            .render(Record::Outcome(&outcome(Ok(home_network()))))
            .unwrap();
        assert!(text.starts_with("{\n    \"success\": true,\n    \"device\""));

        let writer = ConsoleWriter::new(OutputFormat::Compact);
        let text = writer
            .render(Record::Outcome(&outcome(Ok(home_network()))))
            .unwrap();
        assert!(!text.contains('\n'));
        assert!(text.starts_with("{\"success\":true,"));
    }

    #[test]
    fn test_failure_object() {
        let err = QmiCtlError::Action {
            context: "couldn't get home network".to_string(),
            source: ProtocolError::response(QmiStatus::info_unavailable()),
        };
        let value = outcome_value(&outcome(Err(err))).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "couldn't get home network");
        assert_eq!(value["message"], "QMI protocol error (74): 'InfoUnavailable'");
    }

    #[test]
    fn test_retained_client_and_release_error() {
        let mut retained = outcome(Ok(home_network()));
        retained.client = Some(ClientReport {
            service: Service::Nas,
            cid: Cid::new(3).unwrap(),
            disposition: ClientDisposition::Retained,
        });
        let value = outcome_value(&retained).unwrap();
        assert_eq!(value["client_retained"]["service"], "nas");
        assert_eq!(value["client_retained"]["cid"], 3);

        let mut failed = outcome(Ok(home_network()));
        failed.client = Some(ClientReport {
            service: Service::Nas,
            cid: Cid::new(3).unwrap(),
            disposition: ClientDisposition::ReleaseFailed("couldn't release client".to_string()),
        });
        let value = outcome_value(&failed).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["release_error"], "couldn't release client");
    }

    #[test]
    fn test_version_object() {
        let value = version_value();
        assert_eq!(value["success"], true);
        assert_eq!(value["program_name"], "qmictl");
        assert_eq!(value["program_version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_text_outcome() {
        let text = render_text(Record::Outcome(&outcome(Ok(home_network())))).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[/dev/cdc-wdm0] Successfully got home network:");
        assert_eq!(lines[1], "\tMcc: 214");
        assert_eq!(lines[3], "\tDescription: 'Movistar'");

        let done = render_text(Record::Outcome(&outcome(Ok(Response::Completed(
            Completed::new("Network stopped"),
        )))))
        .unwrap();
        assert_eq!(done, "[/dev/cdc-wdm0] Network stopped");
    }

    #[test]
    fn test_text_table_for_flat_lists() {
        let response = Response::ProfileList(ProfileList {
            profile_type: ProfileType::ThreeGpp,
            profiles: vec![
                ProfileSummary {
                    index: 1,
                    name: "internet".to_string(),
                },
                ProfileSummary {
                    index: 2,
                    name: "ims".to_string(),
                },
            ],
        });
        let text = render_text(Record::Outcome(&outcome(Ok(response)))).unwrap();
        assert!(text.contains("Profile type: '3gpp'"));
        assert!(text.contains("internet"));
        assert!(text.contains("Index"));
    }

    #[test]
    fn test_progress_objects() {
        let value = progress_value(
            "/dev/cdc-wdm0",
            &Progress::NetworkStarted {
                packet_data_handle: 42,
                follow: true,
            },
        );
        assert_eq!(value["packet_data_handle"], 42);
        assert_eq!(value["break_to_abort_network"], true);

        let value = progress_value(
            "/dev/cdc-wdm0",
            &Progress::PollFailed {
                error: "operation failed".to_string(),
                message: "operation timed out after 10s".to_string(),
            },
        );
        assert_eq!(value["success"], false);
    }

    #[test]
    fn test_unserializable_fields_are_an_error() {
        let mut keyed_by_pair = std::collections::HashMap::new();
        keyed_by_pair.insert((1u8, 2u8), 3u8);
        assert!(matches!(fields(&keyed_by_pair), Err(OutputError::JsonError(_))));

        let reported = fields(&home_network()).unwrap();
        assert!(reported.contains_key("mcc"));
        assert!(!reported.contains_key("sid"));
    }

    #[test]
    fn test_label() {
        assert_eq!(label("packet_data_handle"), "Packet data handle");
        assert_eq!(label(""), "");
    }
}
