//! Review priority heuristic.
//!
//! The constants and clamp bounds below are product tuning; change them only
//! together with the pinned values in `tests/importance_tests.rs`.

use std::collections::BTreeMap;

use super::tracked::DerivedStatus;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Importance {
    pub value: f64,
    pub breakdown: BTreeMap<String, f64>,
}

impl Importance {
    fn exit(name: &str, value: f64) -> Self {
        let mut breakdown = BTreeMap::new();
        breakdown.insert(name.to_string(), value);
        Self { value, breakdown }
    }

    fn add(&mut self, name: &str, term: f64) {
        self.value += term;
        self.breakdown.insert(name.to_string(), term);
    }
}

fn squared_minutes(minutes: i64, divisor: f64) -> f64 {
    (minutes as f64).powi(2) / divisor
}

pub fn score(pr: &DerivedStatus) -> Importance {
    if pr.is_abandoned {
        return Importance::exit("Abandoned", 0.0);
    }
    if !pr.i_am_author && pr.is_approved {
        return Importance::exit("Approved", 0.0);
    }
    // Mine and approved: go merge it
    if pr.i_am_author && pr.is_approved {
        return Importance::exit("Ready", f64::MAX);
    }
    if pr.is_draft {
        return Importance::exit("Draft", 1.0);
    }

    let mut imp = Importance::default();

    if !pr.i_am_author {
        imp.add("Not mine", 100.0);
    }
    if pr.author_is_teammate {
        imp.add("Teammate", 100.0);
    }
    if pr.author_is_bot {
        imp.add("Bot", -50.0);
    }

    // Smaller diffs first
    let code = (1000.0 / (pr.code_delta as f64 + 100.0)).clamp(0.0, 100.0);
    imp.add("Code delta", code);

    if !pr.i_am_author {
        let reviewers = pr.requested_reviewers.len() as f64;
        imp.add("Reviewer count", (500.0 / (reviewers + 5.0)).clamp(0.0, 100.0));
    }

    if !pr.i_am_author && pr.has_comments_from_me {
        if !pr.last_comment_from_me {
            let latency = squared_minutes(pr.minutes_since_last_comment, 20000.0);
            imp.add("Awaiting reply", latency.clamp(0.0, 300.0));
        }

        if pr.has_new_changes {
            let since_commit = squared_minutes(pr.minutes_since_last_commit, 80000.0);
            imp.add("New changes", since_commit.clamp(0.0, 250.0));
        }
    }

    // Green and nobody has looked yet
    if !pr.i_am_author && pr.num_comments == 0 && pr.job_state_success {
        let since_commit = squared_minutes(pr.minutes_since_last_commit, 80000.0);
        imp.add("First review", since_commit.clamp(0.0, 50.0));
    }

    if pr.i_am_author && !pr.last_comment_from_me {
        let latency = squared_minutes(pr.minutes_since_last_comment, 20000.0);
        imp.add("Comment needed", latency.clamp(0.0, 300.0));
    }

    imp
}
