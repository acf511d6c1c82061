use serde::{Deserialize, Serialize};

pub const CAPACITY_SECTION: &str = "募集状況";
pub const START_SECTION: &str = "予定開始時刻";
pub const ATTENDEE_SECTION: &str = "参加者一覧";
pub const LEAGUE_SECTION_PREFIX: &str = "リグマ";

pub const DEFAULT_COLOR: u32 = 0x000099;

/// Typed section key of a recruitment post. Unknown names survive decoding as
/// `Other` so edits never drop foreign sections.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SectionKind {
    CapacityStatus,
    ScheduledStart,
    AttendeeList,
    /// League block starting at the given `MM/DD HH:MM` label.
    LeagueMatch(String),
    Other(String),
}

impl SectionKind {
    pub fn name(&self) -> String {
        match self {
            Self::CapacityStatus => CAPACITY_SECTION.to_owned(),
            Self::ScheduledStart => START_SECTION.to_owned(),
            Self::AttendeeList => ATTENDEE_SECTION.to_owned(),
            Self::LeagueMatch(label) => format!("{LEAGUE_SECTION_PREFIX} {label}"),
            Self::Other(name) => name.clone(),
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            CAPACITY_SECTION => Self::CapacityStatus,
            START_SECTION => Self::ScheduledStart,
            ATTENDEE_SECTION => Self::AttendeeList,
            other => match other.strip_prefix(LEAGUE_SECTION_PREFIX) {
                Some(label) if label.starts_with(' ') && !label.trim().is_empty() => {
                    Self::LeagueMatch(label.trim().to_owned())
                }
                _ => Self::Other(other.to_owned()),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuredBody {
    pub title: String,
    pub color: u32,
    pub sections: Vec<Section>,
    pub footer: Option<String>,
}

impl StructuredBody {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), color: DEFAULT_COLOR, sections: Vec::new(), footer: None }
    }

    /// Replaces the value of an existing section in place, or appends a new
    /// section at the end.
    pub fn upsert_section(&mut self, kind: SectionKind, value: impl Into<String>) {
        let value = value.into();
        match self.sections.iter_mut().find(|section| section.kind == kind) {
            Some(section) => section.value = value,
            None => self.sections.push(Section { kind, value }),
        }
    }

    pub fn section(&self, kind: &SectionKind) -> Option<&str> {
        self.sections.iter().find(|section| &section.kind == kind).map(|section| section.value.as_str())
    }

    pub fn league_sections(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sections.iter().filter_map(|section| match &section.kind {
            SectionKind::LeagueMatch(label) => Some((label.as_str(), section.value.as_str())),
            _ => None,
        })
    }
}

/// Wire shape handed to platform adapters: an embed with name/value fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedPayload {
    pub title: String,
    pub color: u32,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl From<&StructuredBody> for EmbedPayload {
    fn from(body: &StructuredBody) -> Self {
        Self {
            title: body.title.clone(),
            color: body.color,
            fields: body
                .sections
                .iter()
                .map(|section| EmbedField {
                    name: section.kind.name(),
                    value: section.value.clone(),
                    inline: false,
                })
                .collect(),
            footer: body.footer.clone().map(|text| EmbedFooter { text }),
        }
    }
}

impl From<EmbedPayload> for StructuredBody {
    fn from(payload: EmbedPayload) -> Self {
        Self {
            title: payload.title,
            color: payload.color,
            sections: payload
                .fields
                .into_iter()
                .map(|field| Section { kind: SectionKind::from_name(&field.name), value: field.value })
                .collect(),
            footer: payload.footer.map(|footer| footer.text),
        }
    }
}
