use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Attendance status of a student for the current roll session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollState {
    Unmarked,
    Present,
    Absent,
    Late,
}

impl RollState {
    pub fn parse(s: &str) -> Option<RollState> {
        match s {
            "unmarked" => Some(RollState::Unmarked),
            "present" => Some(RollState::Present),
            "absent" => Some(RollState::Absent),
            "late" => Some(RollState::Late),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RollState::Unmarked => "unmarked",
            RollState::Present => "present",
            RollState::Absent => "absent",
            RollState::Late => "late",
        }
    }
}

impl Default for RollState {
    fn default() -> Self {
        RollState::Unmarked
    }
}

/// One roster entry. Wire field names match the dashboard's existing model:
/// snake_case names, camelCase rollState.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(rename = "rollState", default)]
    pub roll_state: RollState,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    FirstName,
    LastName,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<SortKey> {
        match s {
            "first_name" => Some(SortKey::FirstName),
            "last_name" => Some(SortKey::LastName),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::FirstName => "first_name",
            SortKey::LastName => "last_name",
        }
    }
}

/// State-filter chip selection. `Unmatched` is a recognized-but-unknown key:
/// it derives an empty view rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    #[default]
    All,
    Only(RollState),
    Unmatched,
}

impl StateFilter {
    pub fn parse(s: &str) -> StateFilter {
        if s == "all" {
            StateFilter::All
        } else {
            match RollState::parse(s) {
                Some(state) => StateFilter::Only(state),
                None => StateFilter::Unmatched,
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StateFilter::All => "all",
            StateFilter::Only(state) => state.as_str(),
            StateFilter::Unmatched => "none",
        }
    }
}

/// Case-insensitive substring match of `query` against "first last".
/// An empty pattern matches everything; treating blank input as "no filter"
/// is the caller's job, not this function's.
pub fn search(list: &[Person], query: &str) -> Vec<Person> {
    let needle = query.to_lowercase();
    list.iter()
        .filter(|p| p.full_name().to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Stable, case-insensitive sort on a single name field. Descending reverses
/// the comparator; equal keys keep their prior relative order either way.
pub fn sort_students(mut list: Vec<Person>, key: SortKey, ascending: bool) -> Vec<Person> {
    list.sort_by(|a, b| {
        let ord = compare_key(a, b, key);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    list
}

fn compare_key(a: &Person, b: &Person, key: SortKey) -> Ordering {
    let (x, y) = match key {
        SortKey::FirstName => (&a.first_name, &b.first_name),
        SortKey::LastName => (&a.last_name, &b.last_name),
    };
    x.to_lowercase().cmp(&y.to_lowercase())
}

/// Partition a list by roll state. States with no entries are simply absent
/// from the map.
pub fn group_by_state(list: &[Person]) -> HashMap<RollState, Vec<Person>> {
    let mut groups: HashMap<RollState, Vec<Person>> = HashMap::new();
    for p in list {
        groups.entry(p.roll_state).or_default().push(p.clone());
    }
    groups
}

pub fn filter_by_state(list: &[Person], state: RollState) -> Vec<Person> {
    list.iter()
        .filter(|p| p.roll_state == state)
        .cloned()
        .collect()
}

/// The options a toolbar action can set. `query` is kept verbatim; blank
/// means "no search stage".
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub query: String,
    pub sort_key: Option<SortKey>,
    pub sort_asc: bool,
    pub state_filter: StateFilter,
}

/// Single pure pipeline from the authoritative full list to the displayed
/// view: state filter, then search, then sort. Always starts from `full`, so
/// repeated option changes never compound on an already-filtered view.
pub fn derive_view(full: &[Person], opts: &ViewOptions) -> Vec<Person> {
    let mut view = match opts.state_filter {
        StateFilter::All => full.to_vec(),
        StateFilter::Only(state) => filter_by_state(full, state),
        StateFilter::Unmatched => Vec::new(),
    };
    if !opts.query.trim().is_empty() {
        view = search(&view, &opts.query);
    }
    if let Some(key) = opts.sort_key {
        view = sort_students(view, key, opts.sort_asc);
    }
    view
}
