//! Cluster scenarios for deterministic simulation testing.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: One image load fades in on every node
    Crossfade,

    /// SIM-002: Loads issued faster than they can be presented
    BackToBack,

    /// SIM-003: A renderer joins after the show started
    LateJoin,

    /// SIM-004: A renderer never acknowledges barriers
    SilentNode,

    /// SIM-005: A slow renderer drops out mid-barrier
    Dropout,

    /// SIM-006: Operator drives the pose while scenes change
    PoseDrift,

    /// SIM-007: Video frames stay in step across nodes
    VideoSync,

    /// SIM-008: Missing and undecodable assets
    MissingAsset,

    /// SIM-009: Operator traffic through the control plane and RPCs
    ControlPlane,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Crossfade,
            ScenarioId::BackToBack,
            ScenarioId::LateJoin,
            ScenarioId::SilentNode,
            ScenarioId::Dropout,
            ScenarioId::PoseDrift,
            ScenarioId::VideoSync,
            ScenarioId::MissingAsset,
            ScenarioId::ControlPlane,
        ]
    }

    /// Returns the scenarios that inject faults.
    pub fn faults() -> Vec<ScenarioId> {
        Self::all().into_iter().filter(|s| s.injects_faults()).collect()
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Crossfade => "crossfade",
            ScenarioId::BackToBack => "back_to_back",
            ScenarioId::LateJoin => "late_join",
            ScenarioId::SilentNode => "silent_node",
            ScenarioId::Dropout => "dropout",
            ScenarioId::PoseDrift => "pose_drift",
            ScenarioId::VideoSync => "video_sync",
            ScenarioId::MissingAsset => "missing_asset",
            ScenarioId::ControlPlane => "control_plane",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Crossfade => "loadImage, barrier, present: every node ends on the image",
            ScenarioId::BackToBack => "4 loads issued at once are presented one after another",
            ScenarioId::LateJoin => "a node joining late gets the config and follows the next load",
            ScenarioId::SilentNode => "barrier times out on a mute node and the show goes on",
            ScenarioId::Dropout => "a node leaving during a barrier releases it immediately",
            ScenarioId::PoseDrift => "pose keeps flowing during barriers, all nodes agree bit for bit",
            ScenarioId::VideoSync => "video frame index is identical on every node",
            ScenarioId::MissingAsset => "unresolvable or corrupt assets become error messages",
            ScenarioId::ControlPlane => "UI messages and RPCs drive the coordinator",
        }
    }

    /// Returns true if the scenario breaks a node or a link on purpose.
    pub fn injects_faults(&self) -> bool {
        matches!(
            self,
            ScenarioId::SilentNode | ScenarioId::Dropout | ScenarioId::MissingAsset
        )
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl serde::Serialize for ScenarioId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crossfade" | "sim-001" => Ok(ScenarioId::Crossfade),
            "back_to_back" | "backtoback" | "sim-002" => Ok(ScenarioId::BackToBack),
            "late_join" | "latejoin" | "sim-003" => Ok(ScenarioId::LateJoin),
            "silent_node" | "silentnode" | "sim-004" => Ok(ScenarioId::SilentNode),
            "dropout" | "sim-005" => Ok(ScenarioId::Dropout),
            "pose_drift" | "posedrift" | "sim-006" => Ok(ScenarioId::PoseDrift),
            "video_sync" | "videosync" | "sim-007" => Ok(ScenarioId::VideoSync),
            "missing_asset" | "missingasset" | "sim-008" => Ok(ScenarioId::MissingAsset),
            "control_plane" | "controlplane" | "sim-009" => Ok(ScenarioId::ControlPlane),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
        assert_eq!("SIM-004".parse::<ScenarioId>(), Ok(ScenarioId::SilentNode));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_fault_group() {
        assert_eq!(
            ScenarioId::faults(),
            vec![ScenarioId::SilentNode, ScenarioId::Dropout, ScenarioId::MissingAsset]
        );
    }
}
