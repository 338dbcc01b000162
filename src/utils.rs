/// The kernel truncates `comm` to this many bytes.
pub(crate) const COMM_LEN: usize = 15;

/// Splits `/proc/<pid>/stat` into the command name and the state letter.
///
/// The name sits between the first `(` and the last `)`, so names containing
/// parentheses or spaces survive.
pub(crate) fn parse_stat(stat: &[u8]) -> Option<(&[u8], u8)> {
    let open = stat.iter().position(|&b| b == b'(')?;
    let close = stat.iter().rposition(|&b| b == b')')?;
    let comm = stat.get(open + 1..close)?;
    let state = *stat.get(close + 2)?;

    Some((comm, state))
}

#[inline]
pub(crate) fn basename(path: &[u8]) -> &[u8] {
    path.rsplit(|&b| b == b'/').next().unwrap_or(path)
}

/// Decides whether a process named `comm`, started with the NUL separated
/// `cmdline`, answers to `name` the way `pidof -x` would.
#[must_use]
pub(crate) fn process_matches(name: &[u8], comm: &[u8], cmdline: &[u8]) -> bool {
    let short = &name[..name.len().min(COMM_LEN)];
    let mut args = cmdline.split(|&b| b == 0).filter(|arg| !arg.is_empty());

    let Some(argv0) = args.next().map(basename) else {
        // kernel threads have an empty command line
        return comm == short;
    };

    if argv0 == name || comm == name {
        return true;
    }

    // scripts: `interpreter /path/to/name ...`
    args.next().map(basename) == Some(name) && comm == short
}

/// A `comm` equal to the name already matches. Anything else needs the
/// command line: `exec -a` and scripts match through `argv` alone.
#[inline]
pub(crate) fn needs_cmdline(name: &[u8], comm: &[u8]) -> bool {
    comm != name
}
