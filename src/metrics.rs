//! Metric catalogue, the per-checkpoint table and the flat record handed to
//! persistence.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// `a / b` rounded to two decimals, 0 when `b` is 0.
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    round2(a / b)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_f64() == Some(0.0)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Int(v) => serializer.serialize_i64(*v),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Text(v) => serializer.serialize_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Int(if value { 1 } else { 0 })
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Metric families sampled at every checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Cs,
    Gold,
    Xp,
    Level,
    Damage,
    Kills,
    Deaths,
    Assists,
    Plates,
    GoldShare,
    EnemyCs,
    EnemyGold,
    EnemyXp,
    EnemyLevel,
    EnemyDamage,
    CsDiff,
    GoldDiff,
    XpDiff,
    LevelDiff,
    DamageDiff,
}

impl Metric {
    pub const ALL: [Metric; 20] = [
        Metric::Cs,
        Metric::Gold,
        Metric::Xp,
        Metric::Level,
        Metric::Damage,
        Metric::Kills,
        Metric::Deaths,
        Metric::Assists,
        Metric::Plates,
        Metric::GoldShare,
        Metric::EnemyCs,
        Metric::EnemyGold,
        Metric::EnemyXp,
        Metric::EnemyLevel,
        Metric::EnemyDamage,
        Metric::CsDiff,
        Metric::GoldDiff,
        Metric::XpDiff,
        Metric::LevelDiff,
        Metric::DamageDiff,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Cs => "CS",
            Metric::Gold => "Gold",
            Metric::Xp => "XP",
            Metric::Level => "Level",
            Metric::Damage => "DMG",
            Metric::Kills => "Kills",
            Metric::Deaths => "Deaths",
            Metric::Assists => "Assists",
            Metric::Plates => "Plates",
            Metric::GoldShare => "Gold Share",
            Metric::EnemyCs => "Enemy CS",
            Metric::EnemyGold => "Enemy Gold",
            Metric::EnemyXp => "Enemy XP",
            Metric::EnemyLevel => "Enemy Level",
            Metric::EnemyDamage => "Enemy DMG",
            Metric::CsDiff => "CS Diff",
            Metric::GoldDiff => "Gold Diff",
            Metric::XpDiff => "XP Diff",
            Metric::LevelDiff => "Level Diff",
            Metric::DamageDiff => "DMG Diff",
        }
    }

    /// Damage estimates and ratios are fractional, everything else is a count.
    pub fn is_fractional(&self) -> bool {
        matches!(
            self,
            Metric::Damage | Metric::EnemyDamage | Metric::DamageDiff | Metric::GoldShare
        )
    }

    pub fn zero(&self) -> FieldValue {
        if self.is_fractional() {
            FieldValue::Float(0.0)
        } else {
            FieldValue::Int(0)
        }
    }

    /// Flat column name, e.g. `Gold Diff 14'`.
    pub fn column(&self, minute: u32) -> String {
        format!("{} {}'", self.label(), minute)
    }
}

/// Checkpoint values keyed by (minute, metric).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointTable {
    values: BTreeMap<(u32, Metric), FieldValue>,
}

impl CheckpointTable {
    pub fn insert(&mut self, minute: u32, metric: Metric, value: impl Into<FieldValue>) {
        self.values.insert((minute, metric), value.into());
    }

    /// Every metric of `minute` set to zero.
    pub fn insert_empty(&mut self, minute: u32) {
        for metric in Metric::ALL {
            self.values.insert((minute, metric), metric.zero());
        }
    }

    pub fn get(&self, minute: u32, metric: Metric) -> Option<&FieldValue> {
        self.values.get(&(minute, metric))
    }

    pub fn minutes(&self) -> Vec<u32> {
        let mut minutes: Vec<u32> = self.values.keys().map(|(m, _)| *m).collect();
        minutes.dedup();
        minutes
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Metric, &FieldValue)> {
        self.values.iter().map(|((m, metric), v)| (*m, *metric, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered, sparse name → value record as consumers see it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value if `name` is already present.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
