use super::*;

mod common;

use common::*;

mod finish_not_running;
