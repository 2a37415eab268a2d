mod entry;
mod goal;
mod helpers;
mod import;
mod profile;
mod progress;

pub(crate) use entry::{cmd_entry_edit, cmd_entry_list, cmd_entry_log, cmd_entry_remove};
pub(crate) use goal::{cmd_goal_add, cmd_goal_edit, cmd_goal_list, cmd_goal_remove};
pub(crate) use import::cmd_import;
pub(crate) use profile::{
    cmd_profile_add, cmd_profile_list, cmd_profile_remove, cmd_profile_show, cmd_profile_update,
};
pub(crate) use progress::cmd_progress;
