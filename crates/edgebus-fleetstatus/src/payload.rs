//! The fleet status JSON payload (spec §4.I), field-for-field matching
//! `fleet_status_service.c`'s `publish_fleet_status_update`.

use serde::Serialize;

pub const IGNORED_COMPONENTS: &[&str] = &[
    "aws.greengrass.NucleusLite",
    "aws.greengrass.fleet_provisioning",
    "DeploymentService",
    "FleetStatusService",
    "main",
    "TelemetryAgent",
    "UpdateSystemPolicyService",
];

#[cfg(target_arch = "x86_64")]
pub const ARCHITECTURE: &str = "amd64";
#[cfg(target_arch = "x86")]
pub const ARCHITECTURE: &str = "x86";
#[cfg(target_arch = "aarch64")]
pub const ARCHITECTURE: &str = "aarch64";
#[cfg(target_arch = "arm")]
pub const ARCHITECTURE: &str = "arm";
#[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64", target_arch = "arm")))]
pub const ARCHITECTURE: &str = "unknown";

pub const PLATFORM: &str = "linux";
pub const RUNTIME: &str = "aws_nucleus_lite";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    NucleusLaunch,
    Reconnect,
    Cadence,
    Deployment,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::NucleusLaunch => "NUCLEUS_LAUNCH",
            Trigger::Reconnect => "RECONNECT",
            Trigger::Cadence => "CADENCE",
            Trigger::Deployment => "DEPLOYMENT",
        }
    }
}

impl Serialize for Trigger {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Healthy,
    Unhealthy,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Healthy => "HEALTHY",
            DeviceStatus::Unhealthy => "UNHEALTHY",
        }
    }

    /// BROKEN marks the whole device unhealthy; every other status is fine.
    pub fn from_component_statuses<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Self {
        if statuses.into_iter().any(|s| s == "BROKEN") {
            DeviceStatus::Unhealthy
        } else {
            DeviceStatus::Healthy
        }
    }
}

impl Serialize for DeviceStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    #[serde(rename = "componentName")]
    pub component_name: String,
    pub version: String,
    #[serde(rename = "fleetConfigArns")]
    pub fleet_config_arns: Vec<String>,
    #[serde(rename = "isRoot")]
    pub is_root: bool,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DeploymentInformation {
    #[serde(rename = "deploymentId", skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "statusDetails", skip_serializing_if = "Option::is_none")]
    pub status_details: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetStatusPayload {
    #[serde(rename = "ggcVersion")]
    pub ggc_version: String,
    pub platform: &'static str,
    pub architecture: &'static str,
    pub runtime: &'static str,
    pub thing: String,
    #[serde(rename = "sequenceNumber")]
    pub sequence_number: i64,
    pub timestamp: i64,
    #[serde(rename = "messageType")]
    pub message_type: &'static str,
    pub trigger: Trigger,
    #[serde(rename = "overallDeviceStatus")]
    pub overall_device_status: DeviceStatus,
    pub components: Vec<ComponentInfo>,
    #[serde(rename = "deploymentInformation")]
    pub deployment_information: DeploymentInformation,
}

impl FleetStatusPayload {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

pub fn mqtt_topic(thing_name: &str) -> String {
    format!("$aws/things/{thing_name}/greengrassv2/health/json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_is_unhealthy_when_any_component_is_broken() {
        assert_eq!(
            DeviceStatus::from_component_statuses(["RUNNING", "BROKEN"]),
            DeviceStatus::Unhealthy
        );
        assert_eq!(DeviceStatus::from_component_statuses(["RUNNING", "FINISHED"]), DeviceStatus::Healthy);
        assert_eq!(DeviceStatus::from_component_statuses([]), DeviceStatus::Healthy);
    }

    #[test]
    fn topic_matches_the_well_known_greengrass_health_path() {
        assert_eq!(mqtt_topic("MyThing"), "$aws/things/MyThing/greengrassv2/health/json");
    }

    #[test]
    fn payload_serializes_with_the_expected_field_names() {
        let payload = FleetStatusPayload {
            ggc_version: "2.0.0".into(),
            platform: PLATFORM,
            architecture: ARCHITECTURE,
            runtime: RUNTIME,
            thing: "MyThing".into(),
            sequence_number: 1,
            timestamp: 1_700_000_000_000,
            message_type: "COMPLETE",
            trigger: Trigger::NucleusLaunch,
            overall_device_status: DeviceStatus::Healthy,
            components: vec![ComponentInfo {
                component_name: "com.example.App".into(),
                version: "1.0.0".into(),
                fleet_config_arns: vec![],
                is_root: true,
                status: "RUNNING".into(),
            }],
            deployment_information: DeploymentInformation::default(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"ggcVersion\":\"2.0.0\""));
        assert!(json.contains("\"componentName\":\"com.example.App\""));
        assert!(json.contains("\"trigger\":\"NUCLEUS_LAUNCH\""));
        assert!(json.contains("\"overallDeviceStatus\":\"HEALTHY\""));
    }
}
