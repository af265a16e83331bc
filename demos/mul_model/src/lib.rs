use serde::{Deserialize, Serialize};

use courier_derive::*;

#[derive(Param, Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArithAddArgs {
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "B")]
    pub b: u64,
}

#[derive(Param, Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArithAddReply {
    #[serde(rename = "C")]
    pub c: u64,
}
