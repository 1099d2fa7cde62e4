use serde::Serialize;

/// Hard-coded capability flags for the host device. Surfaced in the startup
/// manifest only; nothing gates on these at runtime.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeviceProfile {
    pub model: String,
    pub npu: bool,
    pub s_pen: bool,
    pub dex_mode: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            model: "generic-android".to_string(),
            npu: true,
            s_pen: true,
            dex_mode: true,
        }
    }
}
