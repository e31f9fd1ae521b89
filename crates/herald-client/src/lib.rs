pub mod remote;

pub use remote::ReqwestRemoteApi;
