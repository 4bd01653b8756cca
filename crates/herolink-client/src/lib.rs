#![doc = include_str!("../README.md")]

mod channel;
mod stub;

pub use channel::RpcChannel;
pub use stub::{ClientStub, HeroClient, HeroServiceStub, ServiceStub};
