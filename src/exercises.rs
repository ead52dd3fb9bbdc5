//! Exercise catalog and completion feedback

use crate::awards::PointRange;
use crate::error::{CoreError, Result};
use rand::Rng;
use serde::Serialize;

/// A Brain Gym exercise players can complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Exercise {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CATALOG: &[Exercise] = &[
    Exercise {
        id: "cross-crawl",
        name: "Cross Crawl",
        description: "Touch each hand to the opposite knee while marching in place",
    },
    Exercise {
        id: "lazy-eights",
        name: "Lazy Eights",
        description: "Trace a large sideways figure eight in the air with your thumb",
    },
    Exercise {
        id: "brain-buttons",
        name: "Brain Buttons",
        description: "Rub the soft spots below your collarbone while holding your navel",
    },
    Exercise {
        id: "hook-ups",
        name: "Hook-ups",
        description: "Cross your ankles and wrists, interlace your fingers and breathe slowly",
    },
    Exercise {
        id: "jumping-jacks",
        name: "Jumping Jacks",
        description: "Jump while spreading your arms and legs, then return to standing",
    },
];

const FEEDBACK_TEMPLATES: &[&str] = &[
    "Great job doing the {exercise}! Your form looks amazing!",
    "Wow! You're nailing the {exercise}! Keep that energy up!",
    "Fantastic work on the {exercise}! You're doing it perfectly!",
    "You're a natural at {exercise}! Keep going strong!",
    "Excellent {exercise}! Your effort is incredible!",
    "Superb technique on the {exercise}! You're crushing it!",
    "Your {exercise} is looking great! Keep that enthusiasm!",
    "Amazing {exercise} work! You're doing wonderfully!",
];

const ENCOURAGEMENTS: &[&str] = &[
    "Awesome!",
    "You're a superstar!",
    "Amazing work!",
    "Fantastic!",
    "You rock!",
    "Incredible!",
    "Outstanding!",
    "Brilliant!",
    "Spectacular!",
    "You're on fire!",
    "Keep it up!",
    "Phenomenal!",
];

/// Look up an exercise by id (case-insensitive)
pub fn find(id: &str) -> Option<&'static Exercise> {
    let id = id.trim();
    CATALOG.iter().find(|e| e.id.eq_ignore_ascii_case(id))
}

/// Points and praise for one completed exercise
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub exercise: &'static Exercise,
    pub points_earned: i64,
    pub feedback: String,
    pub encouragement: &'static str,
}

/// Judge a completed exercise. Unknown ids are rejected; points are always
/// drawn here, never taken from the caller.
pub fn judge<R: Rng + ?Sized>(id: &str, range: &PointRange, rng: &mut R) -> Result<Verdict> {
    let exercise =
        find(id).ok_or_else(|| CoreError::Validation(format!("Invalid exercise type: {}", id)))?;

    let template = FEEDBACK_TEMPLATES[rng.random_range(0..FEEDBACK_TEMPLATES.len())];
    let encouragement = ENCOURAGEMENTS[rng.random_range(0..ENCOURAGEMENTS.len())];

    Ok(Verdict {
        exercise,
        points_earned: range.draw(rng),
        feedback: template.replace("{exercise}", exercise.name),
        encouragement,
    })
}
