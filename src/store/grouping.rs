use chrono::{ DateTime, Duration, TimeZone };

use crate::models::chat::Conversation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyGroup {
    Today,
    Yesterday,
    Last7Days,
    Older,
}

impl RecencyGroup {
    pub const ALL: [RecencyGroup; 4] = [
        RecencyGroup::Today,
        RecencyGroup::Yesterday,
        RecencyGroup::Last7Days,
        RecencyGroup::Older,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            RecencyGroup::Today => "Today",
            RecencyGroup::Yesterday => "Yesterday",
            RecencyGroup::Last7Days => "Last 7 Days",
            RecencyGroup::Older => "Older",
        }
    }
}

/// Sidebar sections. Every conversation lands in exactly one of them, in
/// input order.
#[derive(Debug, Default, PartialEq)]
pub struct ConversationGroups<'a> {
    pub today: Vec<&'a Conversation>,
    pub yesterday: Vec<&'a Conversation>,
    pub last_7_days: Vec<&'a Conversation>,
    pub older: Vec<&'a Conversation>,
}

impl<'a> ConversationGroups<'a> {
    pub fn get(&self, group: RecencyGroup) -> &[&'a Conversation] {
        match group {
            RecencyGroup::Today => &self.today,
            RecencyGroup::Yesterday => &self.yesterday,
            RecencyGroup::Last7Days => &self.last_7_days,
            RecencyGroup::Older => &self.older,
        }
    }

    fn get_mut(&mut self, group: RecencyGroup) -> &mut Vec<&'a Conversation> {
        match group {
            RecencyGroup::Today => &mut self.today,
            RecencyGroup::Yesterday => &mut self.yesterday,
            RecencyGroup::Last7Days => &mut self.last_7_days,
            RecencyGroup::Older => &mut self.older,
        }
    }

    /// Non-empty sections with their titles, in display order.
    pub fn sections(&self) -> Vec<(&'static str, &[&'a Conversation])> {
        RecencyGroup::ALL.iter()
            .map(|g| (g.title(), self.get(*g)))
            .filter(|(_, items)| !items.is_empty())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.today.len() + self.yesterday.len() + self.last_7_days.len() + self.older.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Calendar days are taken in `now`'s timezone.
pub fn classify<Tz: TimeZone>(conversation: &Conversation, now: &DateTime<Tz>) -> RecencyGroup {
    let at = conversation.last_message_at.with_timezone(&now.timezone());
    let today = now.date_naive();
    let day = at.date_naive();

    if day == today {
        RecencyGroup::Today
    } else if today.pred_opt() == Some(day) {
        RecencyGroup::Yesterday
    } else if at >= now.clone() - Duration::days(7) {
        RecencyGroup::Last7Days
    } else {
        RecencyGroup::Older
    }
}

pub fn group_by_recency<'a, Tz: TimeZone>(
    conversations: &'a [Conversation],
    now: &DateTime<Tz>
) -> ConversationGroups<'a> {
    let mut groups = ConversationGroups::default();
    for conversation in conversations {
        groups.get_mut(classify(conversation, now)).push(conversation);
    }
    groups
}
