//! Mapping between MQTT topics and serial keys/devices

use super::{ControlCommand, SensorReading};

/// Level separator for MQTT topics
pub const LEVEL_SEPARATOR: char = '/';

/// A topic split into its `/`-separated levels
///
/// Empty levels (from doubled or trailing slashes) are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath {
    segments: Vec<String>,
}

impl TopicPath {
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split(LEVEL_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last two levels as `(device, action)`
    pub fn device_action(&self) -> Option<(&str, &str)> {
        match self.segments.as_slice() {
            [.., device, action] => Some((device.as_str(), action.as_str())),
            _ => None,
        }
    }
}

/// Builds `"{base}/{lowercase(key)}"`
pub fn reading_to_topic(base: &str, reading: &SensorReading) -> String {
    format!(
        "{}{}{}",
        base.trim_end_matches(LEVEL_SEPARATOR),
        LEVEL_SEPARATOR,
        reading.normalized_key()
    )
}

/// Derives a command from a topic under `control_prefix`
///
/// The last two levels after the prefix become device and action; any further
/// leading levels are ignored. Returns `None` when the topic is outside the
/// prefix or fewer than two levels remain.
pub fn topic_to_command(control_prefix: &str, topic: &str) -> Option<ControlCommand> {
    let prefix = control_prefix.trim_end_matches(LEVEL_SEPARATOR);
    let rest = topic.strip_prefix(prefix)?;
    // "garden/sensors/controller/x/y" must not match prefix "garden/sensors/control"
    let rest = rest.strip_prefix(LEVEL_SEPARATOR)?;

    let path = TopicPath::parse(rest);
    let (device, action) = path.device_action()?;
    Some(ControlCommand::new(device.to_uppercase(), action.to_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_line, encode_command};

    const BASE: &str = "garden/sensors";
    const CONTROL: &str = "garden/sensors/control";

    #[test]
    fn reading_topic_uses_lowercase_key() {
        let reading = SensorReading::new("TEMP", "25.3");
        assert_eq!(reading_to_topic(BASE, &reading), "garden/sensors/temp");
    }

    #[test]
    fn reading_topic_tolerates_trailing_slash_on_base() {
        let reading = SensorReading::new("Soil", "512");
        assert_eq!(reading_to_topic("garden/sensors/", &reading), "garden/sensors/soil");
    }

    #[test]
    fn serial_lines_map_to_topics() {
        for (line, topic, payload) in [
            ("TEMP:25.3", "garden/sensors/temp", "25.3"),
            ("SOIL:512", "garden/sensors/soil", "512"),
            ("LightLevel:High", "garden/sensors/lightlevel", "High"),
        ] {
            let reading = decode_line(line).unwrap();
            assert_eq!(reading_to_topic(BASE, &reading), topic);
            assert_eq!(reading.value, payload);
        }
    }

    #[test]
    fn control_topic_maps_to_command() {
        let cmd = topic_to_command(CONTROL, "garden/sensors/control/pump/on").unwrap();
        assert_eq!(cmd, ControlCommand::new("PUMP", "ON"));
        assert_eq!(encode_command(&cmd), "PUMP:ON\n");
    }

    #[test]
    fn control_topic_case_is_folded_up() {
        let cmd = topic_to_command(CONTROL, "garden/sensors/control/Fan/oFF").unwrap();
        assert_eq!(encode_command(&cmd), "FAN:OFF\n");
    }

    #[test]
    fn extra_leading_levels_are_ignored() {
        let cmd =
            topic_to_command(CONTROL, "garden/sensors/control/bed1/zone2/valve/open").unwrap();
        assert_eq!(cmd, ControlCommand::new("VALVE", "OPEN"));
    }

    #[test]
    fn single_level_is_rejected() {
        assert_eq!(topic_to_command(CONTROL, "garden/sensors/control/fan"), None);
        assert_eq!(topic_to_command(CONTROL, "garden/sensors/control/fan/"), None);
        assert_eq!(topic_to_command(CONTROL, "garden/sensors/control"), None);
        assert_eq!(topic_to_command(CONTROL, "garden/sensors/control/"), None);
    }

    #[test]
    fn empty_levels_are_skipped() {
        let cmd = topic_to_command(CONTROL, "garden/sensors/control//pump//on/").unwrap();
        assert_eq!(cmd, ControlCommand::new("PUMP", "ON"));
    }

    #[test]
    fn topics_outside_prefix_are_rejected() {
        assert_eq!(topic_to_command(CONTROL, "garden/sensors/temp"), None);
        assert_eq!(topic_to_command(CONTROL, "garden/sensors/controller/pump/on"), None);
        assert_eq!(topic_to_command(CONTROL, "other/control/pump/on"), None);
    }

    #[test]
    fn topic_path_device_action() {
        let path = TopicPath::parse("a/b/c");
        assert_eq!(path.len(), 3);
        assert_eq!(path.device_action(), Some(("b", "c")));
        assert!(TopicPath::parse("").is_empty());
        assert_eq!(TopicPath::parse("only").device_action(), None);
    }
}
