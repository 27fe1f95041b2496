mod http_authority;

pub use http_authority::HttpRemoteAuthority;
