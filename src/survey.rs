use std::fmt;

use rocket::FromForm;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Position {
    ForwardFold,
    Bridge,
    FrontSplit,
    MiddleSplit,
    Pancake,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::ForwardFold,
        Position::Bridge,
        Position::FrontSplit,
        Position::MiddleSplit,
        Position::Pancake,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::ForwardFold => "Forward Fold",
            Position::Bridge => "Bridge",
            Position::FrontSplit => "Front Split",
            Position::MiddleSplit => "Middle Split",
            Position::Pancake => "Pancake",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    Beginner,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A yes/no question. Anything other than the two expected values, including
/// no answer at all, is `Unanswered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Yes,
    No,
    Unanswered,
}

impl Reply {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("yes") => Reply::Yes,
            Some("no") => Reply::No,
            _ => Reply::Unanswered,
        }
    }
}

/// How far the hands or head are from the floor in a middle split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StraddleGap {
    Under30cm,
    Wider,
}

impl StraddleGap {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("less_30cm") => StraddleGap::Under30cm,
            _ => StraddleGap::Wider,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyAnswers {
    ForwardFold(Reply),
    Bridge(Reply),
    FrontSplit { first: Reply, second: Reply },
    MiddleSplit(StraddleGap),
    Pancake(Reply),
}

impl SurveyAnswers {
    pub fn position(&self) -> Position {
        match self {
            SurveyAnswers::ForwardFold(_) => Position::ForwardFold,
            SurveyAnswers::Bridge(_) => Position::Bridge,
            SurveyAnswers::FrontSplit { .. } => Position::FrontSplit,
            SurveyAnswers::MiddleSplit(_) => Position::MiddleSplit,
            SurveyAnswers::Pancake(_) => Position::Pancake,
        }
    }

    pub fn level(&self) -> Level {
        match *self {
            SurveyAnswers::ForwardFold(Reply::Yes)
            | SurveyAnswers::Bridge(Reply::Yes)
            | SurveyAnswers::Pancake(Reply::Yes)
            | SurveyAnswers::MiddleSplit(StraddleGap::Under30cm) => Level::Advanced,
            SurveyAnswers::FrontSplit { first: Reply::No, .. } => Level::Beginner,
            SurveyAnswers::FrontSplit {
                second: Reply::Yes, ..
            } => Level::Advanced,
            _ => Level::Beginner,
        }
    }
}

#[derive(Debug, Default, FromForm)]
pub struct SurveyForm {
    pub position: Option<String>,
    pub forward_fold_question: Option<String>,
    pub bridge_question: Option<String>,
    pub front_split_question_1: Option<String>,
    pub front_split_question_2: Option<String>,
    pub middle_split_question: Option<String>,
    pub pancake_question: Option<String>,
}

impl SurveyForm {
    /// Reads only the questions that belong to the chosen position. `None`
    /// when the position is missing or not one of the five known names.
    pub fn answers(&self) -> Option<SurveyAnswers> {
        let position = Position::from_name(self.position.as_deref()?)?;

        let answers = match position {
            Position::ForwardFold => {
                SurveyAnswers::ForwardFold(Reply::parse(self.forward_fold_question.as_deref()))
            }
            Position::Bridge => SurveyAnswers::Bridge(Reply::parse(self.bridge_question.as_deref())),
            Position::FrontSplit => SurveyAnswers::FrontSplit {
                first: Reply::parse(self.front_split_question_1.as_deref()),
                second: Reply::parse(self.front_split_question_2.as_deref()),
            },
            Position::MiddleSplit => {
                SurveyAnswers::MiddleSplit(StraddleGap::parse(self.middle_split_question.as_deref()))
            }
            Position::Pancake => {
                SurveyAnswers::Pancake(Reply::parse(self.pancake_question.as_deref()))
            }
        };

        Some(answers)
    }
}

/// Maps a submitted survey to the (position, level) pair used for template
/// lookup, or `None` when no position was recognised.
pub fn classify(form: &SurveyForm) -> Option<(Position, Level)> {
    form.answers()
        .map(|answers| (answers.position(), answers.level()))
}
