use serde::{Deserialize, Serialize};

pub const TACTICAL_ATTRIBUTE_COUNT: usize = 7;

/// Team tactical attributes published in the `Team_Attributes` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TacticalAttribute {
    BuildUpPlaySpeed,
    BuildUpPlayPassing,
    ChanceCreationPassing,
    ChanceCreationShooting,
    DefencePressure,
    DefenceAggression,
    DefenceTeamWidth,
}

impl TacticalAttribute {
    pub const ALL: [TacticalAttribute; TACTICAL_ATTRIBUTE_COUNT] = [
        TacticalAttribute::BuildUpPlaySpeed,
        TacticalAttribute::BuildUpPlayPassing,
        TacticalAttribute::ChanceCreationPassing,
        TacticalAttribute::ChanceCreationShooting,
        TacticalAttribute::DefencePressure,
        TacticalAttribute::DefenceAggression,
        TacticalAttribute::DefenceTeamWidth,
    ];

    /// Attributes averaged into the synthetic team strength.
    pub const STRENGTH: [TacticalAttribute; 4] = [
        TacticalAttribute::BuildUpPlaySpeed,
        TacticalAttribute::ChanceCreationPassing,
        TacticalAttribute::ChanceCreationShooting,
        TacticalAttribute::DefencePressure,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            TacticalAttribute::BuildUpPlaySpeed => "buildUpPlaySpeed",
            TacticalAttribute::BuildUpPlayPassing => "buildUpPlayPassing",
            TacticalAttribute::ChanceCreationPassing => "chanceCreationPassing",
            TacticalAttribute::ChanceCreationShooting => "chanceCreationShooting",
            TacticalAttribute::DefencePressure => "defencePressure",
            TacticalAttribute::DefenceAggression => "defenceAggression",
            TacticalAttribute::DefenceTeamWidth => "defenceTeamWidth",
        }
    }

    pub fn diff_name(self) -> String {
        format!("{}_diff", self.column_name())
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// One side's tactical attributes for a match. Absent attributes stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TacticalProfile {
    values: [Option<f64>; TACTICAL_ATTRIBUTE_COUNT],
}

impl TacticalProfile {
    pub fn get(&self, attr: TacticalAttribute) -> Option<f64> {
        self.values[attr.slot()]
    }

    pub fn set(&mut self, attr: TacticalAttribute, value: Option<f64>) {
        self.values[attr.slot()] = value;
    }

    pub fn with(mut self, attr: TacticalAttribute, value: f64) -> Self {
        self.set(attr, Some(value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStrength {
    pub home: Option<f64>,
    pub away: Option<f64>,
    pub diff: Option<f64>,
}

/// `home - away` for every attribute present on both sides; others are `None`.
pub fn tactical_differences(
    home: &TacticalProfile,
    away: &TacticalProfile,
) -> [Option<f64>; TACTICAL_ATTRIBUTE_COUNT] {
    let mut out = [None; TACTICAL_ATTRIBUTE_COUNT];
    for attr in TacticalAttribute::ALL {
        if let (Some(h), Some(a)) = (home.get(attr), away.get(attr)) {
            out[attr.slot()] = Some(h - a);
        }
    }
    out
}

/// Unweighted mean of the strength attributes that are present. Missing only
/// when none of them is.
pub fn side_strength(profile: &TacticalProfile) -> Option<f64> {
    let (sum, count) = TacticalAttribute::STRENGTH
        .iter()
        .filter_map(|attr| profile.get(*attr))
        .fold((0.0_f64, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn team_strength(home: &TacticalProfile, away: &TacticalProfile) -> TeamStrength {
    let home = side_strength(home);
    let away = side_strength(away);
    let diff = match (home, away) {
        (Some(h), Some(a)) => Some(h - a),
        _ => None,
    };
    TeamStrength { home, away, diff }
}
