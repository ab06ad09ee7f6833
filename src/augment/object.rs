use std::net::IpAddr;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub ip:    IpAddr,
    pub kind:  String,
    pub name:  String,
    pub ns:    String,
    pub node:  Option<String>,
    pub owner: Option<Owner>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub src: Option<Arc<Object>>,
    pub dst: Option<Arc<Object>>,
}
