//! Fixed presentation vocabularies.
//!
//! The avatar renderer understands a closed set of facial expressions and
//! animation clips. Both sets live here as data so the structured-output
//! contract and the decoder read from the same source.

use std::fmt;
use std::str::FromStr;

/// Error returned when a label is not part of a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown vocabulary label: '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

/// The facial expressions a reply segment may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacialExpression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Fearful,
    Disgusted,
    Confused,
    Excited,
    Bored,
    Thinking,
    Smirk,
    Wink,
    Laughing,
    Embarrassed,
    Proud,
    Worried,
    Relieved,
    Curious,
    Sleepy,
}

impl FacialExpression {
    pub const ALL: [FacialExpression; 20] = [
        Self::Neutral,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Surprised,
        Self::Fearful,
        Self::Disgusted,
        Self::Confused,
        Self::Excited,
        Self::Bored,
        Self::Thinking,
        Self::Smirk,
        Self::Wink,
        Self::Laughing,
        Self::Embarrassed,
        Self::Proud,
        Self::Worried,
        Self::Relieved,
        Self::Curious,
        Self::Sleepy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "Neutral",
            Self::Happy => "Happy",
            Self::Sad => "Sad",
            Self::Angry => "Angry",
            Self::Surprised => "Surprised",
            Self::Fearful => "Fearful",
            Self::Disgusted => "Disgusted",
            Self::Confused => "Confused",
            Self::Excited => "Excited",
            Self::Bored => "Bored",
            Self::Thinking => "Thinking",
            Self::Smirk => "Smirk",
            Self::Wink => "Wink",
            Self::Laughing => "Laughing",
            Self::Embarrassed => "Embarrassed",
            Self::Proud => "Proud",
            Self::Worried => "Worried",
            Self::Relieved => "Relieved",
            Self::Curious => "Curious",
            Self::Sleepy => "Sleepy",
        }
    }
}

impl fmt::Display for FacialExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacialExpression {
    type Err = UnknownLabel;

    /// Matching ignores case and surrounding whitespace; models are not
    /// always careful about capitalisation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Named animation clips, each with a hint describing when to use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Animation {
    StandingIdle,
    StandingIdleRelaxed,
    Waving,
    Shrugging,
    Nodding,
    ShakingHead,
    PointingToSelf,
    Celebrating,
    TalkingWithHands,
    TalkingCalmly,
    Explaining,
    TalkingExcitedly,
    Dancing,
}

impl Animation {
    pub const ALL: [Animation; 13] = [
        Self::StandingIdle,
        Self::StandingIdleRelaxed,
        Self::Waving,
        Self::Shrugging,
        Self::Nodding,
        Self::ShakingHead,
        Self::PointingToSelf,
        Self::Celebrating,
        Self::TalkingWithHands,
        Self::TalkingCalmly,
        Self::Explaining,
        Self::TalkingExcitedly,
        Self::Dancing,
    ];

    /// The clip name the renderer loads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StandingIdle => "M_Standing_Idle_001",
            Self::StandingIdleRelaxed => "M_Standing_Idle_Variations_002",
            Self::Waving => "M_Standing_Expressions_001",
            Self::Shrugging => "M_Standing_Expressions_004",
            Self::Nodding => "M_Standing_Expressions_005",
            Self::ShakingHead => "M_Standing_Expressions_007",
            Self::PointingToSelf => "M_Standing_Expressions_013",
            Self::Celebrating => "M_Standing_Expressions_016",
            Self::TalkingWithHands => "M_Talking_Variations_001",
            Self::TalkingCalmly => "M_Talking_Variations_003",
            Self::Explaining => "M_Talking_Variations_005",
            Self::TalkingExcitedly => "M_Talking_Variations_009",
            Self::Dancing => "M_Dances_001",
        }
    }

    /// Semantic hint given to the model alongside the clip name.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::StandingIdle => "standing still, listening",
            Self::StandingIdleRelaxed => "relaxed idle, shifting weight",
            Self::Waving => "waving hello or goodbye",
            Self::Shrugging => "shrugging, unsure",
            Self::Nodding => "nodding in agreement",
            Self::ShakingHead => "shaking head, disagreeing",
            Self::PointingToSelf => "pointing to self",
            Self::Celebrating => "celebrating, cheering",
            Self::TalkingWithHands => "talking with hands",
            Self::TalkingCalmly => "talking calmly",
            Self::Explaining => "explaining, counting on fingers",
            Self::TalkingExcitedly => "talking excitedly",
            Self::Dancing => "dancing",
        }
    }
}

impl fmt::Display for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Animation {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}
