// Concrete adapters behind the ports in `app::ports`

pub mod http_client;
