/// Subcommands that need a terminal or host networking when containerized
#[derive(Debug)]
pub struct InteractiveTable {
    /// Always attached to a terminal
    pub always: &'static [&'static str],

    /// Attached only when one of the listed flags is present
    pub with_flags: &'static [(&'static str, &'static [&'static str])],

    /// Need ports reachable from the host
    pub host_network: &'static [&'static str],

    /// Global flags whose value is the following argument
    pub value_flags: &'static [&'static str],
}

/// The workload client's interactive subcommands
pub const KUBECTL_INTERACTIVE: InteractiveTable = InteractiveTable {
    always: &["exec", "attach", "port-forward", "proxy", "edit"],
    with_flags: &[
        ("logs", &["-f", "--follow", "--follow=true"]),
        (
            "debug",
            &[
                "-i",
                "-t",
                "-it",
                "-ti",
                "--stdin",
                "--tty",
                "--stdin=true",
                "--tty=true",
            ],
        ),
        (
            "run",
            &[
                "-i",
                "-t",
                "-it",
                "-ti",
                "--stdin",
                "--tty",
                "--stdin=true",
                "--tty=true",
            ],
        ),
    ],
    host_network: &["port-forward", "proxy"],
    value_flags: &[
        "-n",
        "--namespace",
        "--context",
        "--kubeconfig",
        "--cluster",
        "--user",
        "-s",
        "--server",
        "-v",
        "--v",
        "--as",
        "--as-group",
        "--as-uid",
        "--token",
        "--request-timeout",
        "--certificate-authority",
        "--client-certificate",
        "--client-key",
        "--tls-server-name",
        "--cache-dir",
    ],
};

impl InteractiveTable {
    /// First positional argument, skipping global flags and their values
    pub fn subcommand<'a>(&self, args: &'a [String]) -> Option<&'a str> {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "--" {
                return iter.next().map(String::as_str);
            }
            if arg.starts_with('-') {
                if !arg.contains('=') && self.value_flags.contains(&arg.as_str()) {
                    iter.next();
                }
                continue;
            }
            return Some(arg);
        }
        None
    }

    /// Whether the invocation needs `-i -t`
    pub fn needs_tty(&self, args: &[String]) -> bool {
        let Some(sub) = self.subcommand(args) else {
            return false;
        };
        if self.always.contains(&sub) {
            return true;
        }
        self.with_flags
            .iter()
            .find(|(name, _)| *name == sub)
            .is_some_and(|(_, flags)| args.iter().any(|a| flags.contains(&a.as_str())))
    }

    /// Whether the invocation expects ports exposed on the host
    pub fn needs_host_network(&self, args: &[String]) -> bool {
        self.subcommand(args)
            .is_some_and(|sub| self.host_network.contains(&sub))
    }
}
