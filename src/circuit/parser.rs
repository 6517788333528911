use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::{
    circuit::{Circuit, CircuitError, ParserError},
    lit::AigLit,
};

fn read_u32(s: &str) -> Result<u32, ParserError> {
    s.parse::<u32>()
        .map_err(|_| ParserError::InvalidToken(s.to_string() + " expected u32"))
}

fn check_even(x: u32) -> Result<(), ParserError> {
    if x & 1 == 1 {
        return Err(ParserError::InvalidToken(
            "expected literal to be even, got ".to_string() + &x.to_string(),
        ));
    }
    Ok(())
}

/// Reads one line into `line` (cleared first), failing on a premature end of file.
fn read_line(reader: &mut impl BufRead, line: &mut String) -> Result<(), ParserError> {
    line.clear();
    if reader.read_line(line)? == 0 {
        return Err(ParserError::InvalidToken(
            "unexpected end of file".to_string(),
        ));
    }
    Ok(())
}

/// Reads a line holding exactly one literal.
fn read_single_lit(line: &str, what: &str) -> Result<u32, ParserError> {
    let tokens = line.split_whitespace().collect::<Vec<&str>>();

    if tokens.is_empty() {
        return Err(ParserError::InvalidToken(format!(
            "expected {what} token, got nothing"
        )));
    }

    if tokens.len() > 1 {
        return Err(ParserError::InvalidToken(format!(
            "expected nothing after {what}, got {}",
            tokens[1]
        )));
    }

    read_u32(tokens[0])
}

fn read_output(line: &str) -> Result<AigLit, ParserError> {
    Ok(AigLit::new(read_single_lit(line, "output")?))
}

fn read_outputs(o: u32, reader: &mut impl BufRead) -> Result<Vec<AigLit>, ParserError> {
    let mut outputs = Vec::new();
    let mut line = String::new();
    for _ in 0..o {
        read_line(reader, &mut line)?;
        outputs.push(read_output(&line)?);
    }
    Ok(outputs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    m: u32,
    i: u32,
    l: u32,
    o: u32,
    a: u32,
}

impl TryFrom<&str> for Header {
    type Error = ParserError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let tokens = line.split_whitespace().collect::<Vec<&str>>();

        if tokens.len() < 6 {
            return Err(ParserError::InvalidToken(
                "missing header tokens".to_string(),
            ));
        }

        if tokens[0] != "aag" && tokens[0] != "aig" {
            return Err(ParserError::InvalidToken(
                "expected aag (or at least aig)".to_string(),
            ));
        }

        let m = read_u32(tokens[1])?;
        let i = read_u32(tokens[2])?;
        let l = read_u32(tokens[3])?;
        let o = read_u32(tokens[4])?;
        let a = read_u32(tokens[5])?;

        if tokens.len() > 6 {
            return Err(ParserError::UnsupportedFeature(
                "header only supports M I L O A".to_string(),
            ));
        }

        if l > 0 {
            return Err(ParserError::UnsupportedFeature(
                "latches are not supported, circuits must be combinational".to_string(),
            ));
        }

        Ok(Header { m, i, l, o, a })
    }
}

/// Parser for the ASCII AIGER format.
mod ascii {
    use std::io::BufRead;

    use crate::{
        circuit::{
            AndGate, Circuit, CircuitError, ParserError,
            parser::{Header, check_even, read_line, read_outputs, read_single_lit, read_u32},
        },
        lit::AigLit,
    };

    pub(super) fn read_input(line: &str) -> Result<AigLit, ParserError> {
        let i = read_single_lit(line, "input")?;
        check_even(i)?;
        Ok(AigLit::new(i))
    }

    fn read_inputs(i: u32, reader: &mut impl BufRead) -> Result<Vec<AigLit>, ParserError> {
        let mut inputs = Vec::new();
        let mut line = String::new();
        for _ in 0..i {
            read_line(reader, &mut line)?;
            inputs.push(read_input(&line)?);
        }
        Ok(inputs)
    }

    pub(super) fn read_and(line: &str) -> Result<AndGate, ParserError> {
        let tokens = line.split_whitespace().collect::<Vec<&str>>();

        if tokens.len() < 3 {
            return Err(ParserError::InvalidToken(
                "not enough and tokens".to_string(),
            ));
        }

        if tokens.len() > 3 {
            return Err(ParserError::InvalidToken(
                "expected nothing after and tokens, got ".to_string() + tokens[3],
            ));
        }

        let lhs = read_u32(tokens[0])?;
        let rhs0 = read_u32(tokens[1])?;
        let rhs1 = read_u32(tokens[2])?;

        check_even(lhs)?;
        Ok(AndGate {
            lhs: AigLit::new(lhs),
            rhs0: AigLit::new(rhs0),
            rhs1: AigLit::new(rhs1),
        })
    }

    fn read_ands(a: u32, reader: &mut impl BufRead) -> Result<Vec<AndGate>, ParserError> {
        let mut ands = Vec::new();
        let mut line = String::new();
        for _ in 0..a {
            read_line(reader, &mut line)?;
            ands.push(read_and(&line)?);
        }
        Ok(ands)
    }

    impl Circuit {
        /// Creates a circuit from an open .aag file using ASCII format.
        ///
        /// The symbol table and comments are ignored.
        pub fn from_ascii(mut reader: impl BufRead) -> Result<Self, CircuitError> {
            let mut line = String::new();
            read_line(&mut reader, &mut line)?;
            let header = Header::try_from(line.as_str())?;

            let inputs = read_inputs(header.i, &mut reader)?;
            let outputs = read_outputs(header.o, &mut reader)?;
            let ands = read_ands(header.a, &mut reader)?;

            Circuit::new(header.m, inputs, outputs, ands)
        }
    }

}

/// Parser for the bin AIGER format.
mod bin {
    use std::io::{BufRead, Read};

    use crate::{
        circuit::{
            AndGate, Circuit, CircuitError, ParserError,
            parser::{Header, read_line, read_outputs},
        },
        lit::AigLit,
    };

    fn getnoneofch(buf: &[u8], offset: &mut usize) -> Result<u8, ParserError> {
        if *offset >= buf.len() {
            return Err(ParserError::InvalidToken(
                "unexpected end of file".to_string(),
            ));
        }

        let byte = buf[*offset];
        *offset += 1;
        Ok(byte)
    }

    pub(super) fn decode_delta(buf: &[u8], offset: &mut usize) -> Result<u32, ParserError> {
        let mut x: u32 = 0;
        let mut i = 0;

        loop {
            let ch = getnoneofch(buf, offset)?;
            if i >= 5 {
                return Err(ParserError::InvalidToken(
                    "delta does not fit in 32 bits".to_string(),
                ));
            }
            x |= ((ch & 0x7f) as u32) << (7 * i);
            i += 1;

            if ch & 0x80 == 0 {
                break;
            }
        }
        Ok(x)
    }

    fn read_ands(reader: &mut impl Read, header: Header) -> Result<Vec<AndGate>, ParserError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;

        let mut offset = 0;
        let mut lhs = 2 * (header.i + header.l + 1);
        let mut ands = Vec::with_capacity(header.a as usize);

        for _ in 0..header.a {
            let delta0 = decode_delta(&buf, &mut offset)?;
            let delta1 = decode_delta(&buf, &mut offset)?;

            let rhs0 = lhs.checked_sub(delta0).ok_or_else(|| {
                ParserError::InvalidToken(format!("delta {delta0} too large for and {lhs}"))
            })?;
            let rhs1 = rhs0.checked_sub(delta1).ok_or_else(|| {
                ParserError::InvalidToken(format!("delta {delta1} too large for and {lhs}"))
            })?;

            ands.push(AndGate {
                lhs: AigLit::new(lhs),
                rhs0: AigLit::new(rhs0),
                rhs1: AigLit::new(rhs1),
            });
            lhs += 2;
        }

        Ok(ands)
    }

    impl Circuit {
        /// Creates a circuit from an open .aig file using binary format.
        pub fn from_bin(mut reader: impl BufRead) -> Result<Self, CircuitError> {
            let mut line = String::new();
            read_line(&mut reader, &mut line)?;
            let header = Header::try_from(line.as_str())?;

            // Inputs are implicit in the binary format.
            let inputs = (1..=header.i).map(AigLit::from_index).collect();
            let outputs = read_outputs(header.o, &mut reader)?;
            let ands = read_ands(&mut reader, header)?;

            Circuit::new(header.m, inputs, outputs, ands)
        }
    }

}

impl Circuit {
    /// Creates a circuit from an .aig (resp .aag) file using bin (resp. ASCII) AIGER format.
    ///
    /// Only combinational AIGs are supported: any latch is rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CircuitError> {
        let f = File::open(path.as_ref()).map_err(ParserError::from)?;
        let reader = BufReader::new(f);
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("aag") => Circuit::from_ascii(reader),
            Some("aig") => Circuit::from_bin(reader),
            _ => Err(ParserError::IoError(
                "invalid extension, expected .aag or .aig".to_string(),
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_u32_test() {
        assert!(read_u32("").is_err());
        assert!(read_u32(" ").is_err());
        assert!(read_u32(" 2").is_err());
        assert!(read_u32("2 ").is_err());
        assert!(read_u32("-5").is_err());

        assert_eq!(read_u32("42").unwrap(), 42);
        assert_eq!(read_u32("0").unwrap(), 0);
    }

    #[test]
    fn read_output_test() {
        assert!(read_output("").is_err());
        assert!(read_output("2 14").is_err());
        assert_eq!(read_output(" 3 ").unwrap(), AigLit::new(3));
    }

    #[test]
    fn header_try_from_test() {
        assert!(Header::try_from("").is_err());
        assert!(Header::try_from("aag 0 0 0 0").is_err());

        assert_eq!(
            Header::try_from("   aag 0 0 0 0 0 ").unwrap(),
            Header {
                m: 0,
                i: 0,
                l: 0,
                o: 0,
                a: 0
            }
        );

        assert_eq!(
            Header::try_from("aig 3 2 0 1 1").unwrap(),
            Header {
                m: 3,
                i: 2,
                l: 0,
                o: 1,
                a: 1
            }
        );

        assert!(Header::try_from("aag 1 1 -1 1 1").is_err());
        assert!(matches!(
            Header::try_from("aag 3 1 1 1 1"),
            Err(ParserError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn from_file_test() {
        let c = Circuit::from_file("assets/circuits/and2.aag").unwrap();
        assert_eq!(c.num_inputs(), 2);
        assert_eq!(c.ands().len(), 1);
        assert!(Circuit::from_file("assets/circuits/and2.txt").is_err());
        assert!(matches!(
            Circuit::from_file("assets/circuits/nope.aag"),
            Err(CircuitError::ParserError(ParserError::IoError(_)))
        ));
    }
}
