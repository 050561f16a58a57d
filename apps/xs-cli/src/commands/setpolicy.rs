// setpolicy.rs - Deploy a policy document to the daemon.

use clap::Args;
use xs_submit::{
    ClientConfig, SetPolicyRequest, SubmitError, SubmissionWorkflow, TransportReadback,
};

#[derive(Args)]
#[command(after_help = "\
The only policytype that is currently supported is 'ACM'.

The filename of the policy is the policy name plus the suffix
'-security_policy.xml'. Dots in the policy name separate directories.
The policy file is looked up in the current directory first, then in
the system policy directory ('/etc/xen/acm-security/policies' unless
configured otherwise).")]
pub struct SetPolicyArgs {
    /// Policy family (case-insensitive).
    pub policytype: String,

    /// Dotted policy name, e.g. example.chwall.
    pub policyname: String,

    /// Print help.
    #[arg(short = '?', short_alias = 'h', long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

pub fn execute(args: &SetPolicyArgs, config: &ClientConfig) -> anyhow::Result<()> {
    let request = SetPolicyRequest::new(&args.policytype, &args.policyname);

    let resolver = config.resolver();
    let transport = config.transport().map_err(SubmitError::from)?;
    let readback = TransportReadback::new(&*transport);

    let report =
        SubmissionWorkflow::new(&resolver, &*transport, &readback).run(&request)?;

    tracing::info!(
        "Deployed {} via {}",
        report.policy_path.display(),
        report.transport
    );
    println!("Successfully set the new policy.");

    match report.readback {
        Ok(policy) => println!("{}", policy.summary()),
        Err(e) => eprintln!("Warning: could not read back the active policy: {}", e),
    }
    Ok(())
}
