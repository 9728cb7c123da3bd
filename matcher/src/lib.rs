/*!
# relint matcher

Correlates the raw findings of one analysis pass against the previously
tracked findings of the same file, so that identity survives edits.

The engine works on [`MatchToken`], a flat projection every matchable shape
converts to, and pairs tokens in three passes of decreasing confidence:

1. same rule key and identical text-range digest,
2. same rule key and identical line-content digest,
3. same rule key and message, nearest line number.

Each pass removes its pairs from further consideration; whatever is left on
the raw side is new, whatever is left on the previous side is gone. For a
given input pair the result is deterministic and a one-to-one correlation.
*/

mod correlate;
mod token;

pub use correlate::{Matching, correlate};
pub use token::MatchToken;
