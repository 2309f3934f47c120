use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
	Answered,
	Abstained,
	Escalate,
}
impl Decision {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Answered => "ANSWERED",
			Self::Abstained => "ABSTAINED",
			Self::Escalate => "ESCALATE",
		}
	}
}

/// Classifies the final ranking by its top score. The threshold is inclusive.
pub fn choose_decision(top_score: Option<f32>, min_score_for_answer: f32) -> Decision {
	match top_score {
		None => Decision::Abstained,
		Some(score) if score < min_score_for_answer => Decision::Escalate,
		Some(_) => Decision::Answered,
	}
}
