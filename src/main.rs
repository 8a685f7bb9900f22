use clap::Parser;
use dsrecon::args::Args;
use dsrecon::credentials::Credentials;
use dsrecon::debug::{error_log, set_debug_level};
use dsrecon::error::ReconError;
use dsrecon::ldap::LdapSession;
use dsrecon::target::Target;
use dsrecon::transport;

fn main() {
    let args = Args::parse();
    set_debug_level(args.debug);

    if let Err(e) = run(&args) {
        error_log(e.to_string());
        std::process::exit(e.exit_code());
    }
}

fn run(args: &Args) -> Result<(), ReconError> {
    let credentials = Credentials::new(
        &args.domain,
        &args.username,
        args.password.clone(),
        args.hashes.as_deref(),
        args.aes_key.clone(),
        args.auth_method(),
    )?;

    let mut target = Target::new(&args.dc_ip, args.port);
    transport::negotiate(&mut target)?;
    println!(
        "[*] Target {} reachable on port {} ({})",
        target.remote,
        target.method_port.unwrap_or_default(),
        if target.use_tls() { "ldaps" } else { "ldap" }
    );

    let mut session = LdapSession::open(&credentials, &target)?;
    if let Some(contexts) = &session.naming_contexts {
        println!("[*] Default naming context: {}", contexts.default);
    }

    let accounts = session.get_all_accounts()?;
    println!("[+] Retrieved {} accounts", accounts.len());
    for account in &accounts {
        println!("{account}");
    }

    Ok(())
}
