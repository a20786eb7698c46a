//! Tournament business logic: setup, bracket building, the match protocol, advancement.

pub mod advancement;
pub mod bracket;
pub mod dispute;
pub mod match_flow;
pub mod setup;
pub mod swiss;
pub mod veto;

pub use advancement::{Coordinator, Effect};
pub use bracket::{build_bracket, Bracket, Route};
pub use match_flow::{transition, Env, Expected, MatchAction};
pub use setup::{generate_test_teams, register_team, validate_field};
pub use swiss::{pair_round, standings, Standing};
pub use veto::{apply_ban, next_veto_action, remaining_maps};
