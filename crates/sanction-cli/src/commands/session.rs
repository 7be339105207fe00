use anyhow::Result;
use sanction_core::session::SessionId;

pub fn new_session() {
    println!("{}", SessionId::generate());
}

pub fn validate(candidate: &str) -> Result<()> {
    let session = SessionId::parse(candidate)?;
    println!("✅ {} is a valid session id", session);
    Ok(())
}
