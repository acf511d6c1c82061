use boshu_core::config::{LeaveMode, ReactionConfig};
use boshu_core::RosterAction;

/// Maps reaction events to roster actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionPolicy {
    join_emoji: String,
    leave_emoji: String,
    stop_emoji: String,
    leave_mode: LeaveMode,
}

impl Default for ReactionPolicy {
    fn default() -> Self {
        Self::new("✋", "↩", "🚫", LeaveMode::JoinRemoval)
    }
}

impl ReactionPolicy {
    pub fn new(
        join_emoji: impl Into<String>,
        leave_emoji: impl Into<String>,
        stop_emoji: impl Into<String>,
        leave_mode: LeaveMode,
    ) -> Self {
        Self {
            join_emoji: normalize_emoji(&join_emoji.into()),
            leave_emoji: normalize_emoji(&leave_emoji.into()),
            stop_emoji: normalize_emoji(&stop_emoji.into()),
            leave_mode,
        }
    }

    pub fn from_config(config: &ReactionConfig) -> Self {
        Self::new(&*config.join_emoji, &*config.leave_emoji, &*config.stop_emoji, config.leave_mode)
    }

    pub fn leave_mode(&self) -> LeaveMode {
        self.leave_mode
    }

    pub fn action_for(&self, emoji: &str, added: bool) -> Option<RosterAction> {
        let emoji = normalize_emoji(emoji);
        if emoji.is_empty() {
            return None;
        }

        if emoji == self.join_emoji {
            return match (added, self.leave_mode.uses_join_removal()) {
                (true, _) => Some(RosterAction::Join),
                (false, true) => Some(RosterAction::Leave),
                (false, false) => None,
            };
        }
        if emoji == self.leave_emoji && added && self.leave_mode.uses_dedicated_emoji() {
            return Some(RosterAction::Leave);
        }
        if emoji == self.stop_emoji && added {
            return Some(RosterAction::Stop);
        }

        None
    }

    /// Reactions seeded onto a fresh recruitment post.
    pub fn affordances(&self) -> Vec<String> {
        let mut emoji = vec![self.join_emoji.clone()];
        if self.leave_mode.uses_dedicated_emoji() {
            emoji.push(self.leave_emoji.clone());
        }
        emoji.push(self.stop_emoji.clone());
        emoji
    }

    pub fn title(&self) -> String {
        if self.leave_mode.uses_dedicated_emoji() {
            format!(
                "参加者募集中（{}参加 {}参加取消 {}募集停止）",
                self.join_emoji, self.leave_emoji, self.stop_emoji
            )
        } else {
            format!("参加者募集中（{}参加 {}募集停止）", self.join_emoji, self.stop_emoji)
        }
    }
}

/// Platforms disagree on variation selectors and `:name:` wrapping.
fn normalize_emoji(raw: &str) -> String {
    raw.trim().trim_matches(':').chars().filter(|ch| *ch != '\u{FE0F}').collect()
}
