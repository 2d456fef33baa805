use chrono::{DateTime, Utc};

use crate::view::{self, Person, RollState, SortKey, StateFilter, ViewOptions};

/// Fetch indicator for the home board roster, mirrored to the UI verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Errored => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RollSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollCount {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
}

/// Home-board state. Two slots: `full` is the authoritative last-fetched
/// roster and the only input to `derive_view`; `view` is the derived list the
/// UI renders. Every option or roll-state change rebuilds `view` from `full`,
/// so repeated filter/search/sort actions never compound.
#[derive(Default)]
pub struct HomeBoard {
    load: LoadState,
    full: Vec<Person>,
    view: Vec<Person>,
    opts: ViewOptions,
    roll: Option<RollSession>,
}

impl HomeBoard {
    pub fn load_state(&self) -> LoadState {
        self.load
    }

    pub fn is_loaded(&self) -> bool {
        self.load == LoadState::Loaded
    }

    pub fn begin_load(&mut self) {
        self.load = LoadState::Loading;
    }

    /// Accept a fresh roster fetch. Options reset; any active roll ends.
    pub fn loaded(&mut self, students: Vec<Person>) {
        self.full = students;
        self.opts = ViewOptions::default();
        self.roll = None;
        self.load = LoadState::Loaded;
        self.refresh();
    }

    pub fn load_failed(&mut self) {
        self.full.clear();
        self.view.clear();
        self.roll = None;
        self.load = LoadState::Errored;
    }

    pub fn full(&self) -> &[Person] {
        &self.full
    }

    pub fn view(&self) -> &[Person] {
        &self.view
    }

    pub fn options(&self) -> &ViewOptions {
        &self.opts
    }

    fn refresh(&mut self) -> &[Person] {
        self.view = view::derive_view(&self.full, &self.opts);
        &self.view
    }

    pub fn set_query(&mut self, query: String) -> &[Person] {
        self.opts.query = query;
        self.refresh()
    }

    /// Explicit direction when given; otherwise toggle, flipping to ascending
    /// when the key changes (the toolbar's click behavior).
    pub fn set_sort(&mut self, key: SortKey, ascending: Option<bool>) -> &[Person] {
        let asc = match ascending {
            Some(v) => v,
            None if self.opts.sort_key == Some(key) => !self.opts.sort_asc,
            None => true,
        };
        self.opts.sort_key = Some(key);
        self.opts.sort_asc = asc;
        self.refresh()
    }

    pub fn set_state_filter(&mut self, filter: StateFilter) -> &[Person] {
        self.opts.state_filter = filter;
        self.refresh()
    }

    /// Drop every option and show the full roster again.
    pub fn clear_filters(&mut self) -> &[Person] {
        self.opts = ViewOptions::default();
        self.refresh()
    }

    /// Replace the authoritative roster from a snapshot, keeping load state.
    pub fn restore_full(&mut self, students: Vec<Person>) -> &[Person] {
        self.full = students;
        self.refresh()
    }

    pub fn roll(&self) -> Option<&RollSession> {
        self.roll.as_ref()
    }

    /// Enter roll mode. Every student is reset to unmarked, so the counts
    /// start from zero on each (re)entry.
    pub fn start_roll(&mut self, session: RollSession) {
        for p in &mut self.full {
            p.roll_state = RollState::Unmarked;
        }
        self.roll = Some(session);
        self.refresh();
    }

    /// Mark a student in place on the authoritative list. Returns the updated
    /// record, or None when the id is not in the roster.
    pub fn mark(&mut self, student_id: i64, state: RollState) -> Option<Person> {
        let marked = self.full.iter_mut().find(|p| p.id == student_id)?;
        marked.roll_state = state;
        let out = marked.clone();
        self.refresh();
        Some(out)
    }

    /// Counts are derived from the full roster on demand; re-marking a
    /// student moves a count rather than double-counting.
    pub fn counts(&self) -> RollCount {
        let groups = view::group_by_state(&self.full);
        let len_of = |state: RollState| {
            groups.get(&state).map_or(0, |g| g.len() as u32)
        };
        RollCount {
            present: len_of(RollState::Present),
            absent: len_of(RollState::Absent),
            late: len_of(RollState::Late),
        }
    }

    pub fn end_roll(&mut self) -> Option<RollSession> {
        self.roll.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: i64, first: &str, last: &str) -> Person {
        Person {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            roll_state: RollState::Unmarked,
        }
    }

    fn session() -> RollSession {
        RollSession {
            id: "test-roll".to_string(),
            started_at: Utc::now(),
        }
    }

    fn loaded_board() -> HomeBoard {
        let mut board = HomeBoard::default();
        board.loaded(vec![
            person(1, "Jane", "Doe"),
            person(2, "John", "Smith"),
            person(3, "Amy", "Apple"),
        ]);
        board
    }

    fn ids(list: &[Person]) -> Vec<i64> {
        list.iter().map(|p| p.id).collect()
    }

    #[test]
    fn filter_always_rederives_from_the_full_list() {
        let mut board = loaded_board();
        board.start_roll(session());
        board.mark(1, RollState::Present);
        board.mark(2, RollState::Late);

        assert_eq!(ids(board.set_state_filter(StateFilter::Only(RollState::Present))), vec![1]);
        // Switching chips must not filter the already-narrowed view.
        assert_eq!(ids(board.set_state_filter(StateFilter::Only(RollState::Late))), vec![2]);
        assert_eq!(ids(board.set_state_filter(StateFilter::All)), vec![1, 2, 3]);
    }

    #[test]
    fn clear_restores_the_exact_full_list() {
        let mut board = loaded_board();
        board.set_query("jane".to_string());
        board.set_sort(SortKey::FirstName, Some(true));
        assert_eq!(ids(board.clear_filters()), vec![1, 2, 3]);
    }

    #[test]
    fn restarting_a_roll_zeroes_the_counts() {
        let mut board = loaded_board();
        board.start_roll(session());
        board.mark(1, RollState::Present);
        board.mark(1, RollState::Absent);
        let counts = board.counts();
        assert_eq!((counts.present, counts.absent, counts.late), (0, 1, 0));

        board.start_roll(session());
        assert_eq!(board.counts(), RollCount::default());
    }

    #[test]
    fn sort_toggles_when_direction_is_omitted() {
        let mut board = loaded_board();
        assert_eq!(ids(board.set_sort(SortKey::FirstName, None)), vec![3, 1, 2]);
        assert_eq!(ids(board.set_sort(SortKey::FirstName, None)), vec![2, 1, 3]);
        // New key starts ascending again.
        assert_eq!(ids(board.set_sort(SortKey::LastName, None)), vec![3, 1, 2]);
    }

    #[test]
    fn load_failure_clears_the_roster() {
        let mut board = loaded_board();
        board.begin_load();
        assert_eq!(board.load_state(), LoadState::Loading);
        board.load_failed();
        assert_eq!(board.load_state(), LoadState::Errored);
        assert!(board.view().is_empty());
        assert!(!board.is_loaded());
    }
}
