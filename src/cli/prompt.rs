//! Interactive yes/no confirmation

use std::io::{self, BufRead, Write};

/// Ask `question` until the answer is `y` or `n`
///
/// End of input counts as "no".
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    loop {
        write!(output, "{question} [y/n]: ")?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }

        match answer.trim() {
            "y" | "Y" => return Ok(true),
            "n" | "N" => return Ok(false),
            _ => writeln!(output, "Please answer y or n.")?,
        }
    }
}

/// [`confirm`] on the terminal, skipped when `assume_yes` is set
pub fn confirm_stdio(question: &str, assume_yes: bool) -> io::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    confirm(&mut io::stdin().lock(), &mut io::stdout(), question)
}
