use serde::{Deserialize, Deserializer, Serialize};

pub mod control_measure;
pub mod counter;
pub mod department;
pub mod hazard_entry;
pub mod user;

/// Progress of a hazard entry or a control measure.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum ImplementationStatus {
    Ongoing,
    Implemented,
    #[serde(rename = "For Implementation")]
    ForImplementation,
}

/// Tells an absent field (`None`) apart from an explicit `null` (`Some(None)`).
/// Use together with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
