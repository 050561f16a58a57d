// getpolicy.rs - Show the policy currently managed by the daemon.

use xs_submit::{ClientConfig, SubmitError};

pub fn execute(dumpxml: bool, config: &ClientConfig) -> anyhow::Result<()> {
    let transport = config.transport().map_err(SubmitError::from)?;
    let policy = transport.get_policy().map_err(SubmitError::from)?;

    println!("{}", policy.summary());

    if dumpxml {
        println!();
        match &policy.xml {
            Some(xml) => println!("{}", xml),
            None => println!("The daemon did not return the policy's XML representation."),
        }
    }
    Ok(())
}
