use std::{
    collections::HashSet,
    fs::File,
    io::{Read, Write},
    path::PathBuf,
    str::FromStr,
};

use dispatch_board::{TenCodeEntry, TenCodeTable};
use lazy_static::lazy_static;
use proc_macro2::{Ident, Literal, Span, TokenStream};
use quote::{TokenStreamExt, quote};
use regex::Regex;

lazy_static! {
    static ref RE_DENIED_IDENT_CHARS: Regex = Regex::new("[^0-9A-Za-z_]").unwrap();
}

fn clean_ident_name(source: &str) -> String {
    let mut clean: String = RE_DENIED_IDENT_CHARS.replace_all(source, "_").to_string();
    while clean.contains("__") {
        clean = clean.replace("__", "_")
    }
    clean.trim_matches('_').to_string()
}

fn code_const_name(entry: &TenCodeEntry) -> String {
    format!("CODE_{}", clean_ident_name(&entry.code.to_uppercase()))
}

fn gen_code(entry: &TenCodeEntry) -> TokenStream {
    let ident = Ident::new(&code_const_name(entry), Span::call_site());
    let code_lit = Literal::string(&entry.code);
    let meaning_lit = Literal::string(&entry.meaning);

    quote! {
        pub const #ident: ::dispatch_board::StaticTenCode = ::dispatch_board::StaticTenCode {
            code: #code_lit,
            meaning: #meaning_lit,
        };
    }
}

fn gen_ten_codes_mod(table: &TenCodeTable) -> TokenStream {
    let all_codes_refs = table.codes.iter().map(|entry| {
        let ident = Ident::new(&code_const_name(entry), Span::call_site());
        quote! {
            &#ident
        }
    });

    let all_codes = table.codes.iter().map(gen_code);

    quote! {
        pub mod ten_codes {
            #(#all_codes)*
            pub const ALL: &[&::dispatch_board::StaticTenCode] = &[
                #(#all_codes_refs),*
            ];
        }
    }
}

fn check_unique(table: &TenCodeTable) {
    let mut seen = HashSet::new();
    for entry in &table.codes {
        let name = code_const_name(entry);
        if !seen.insert(name.clone()) {
            panic!("Ten-code {:?} collides with another entry as {}", entry.code, name);
        }
    }
}

const TABLE_PATH: &str = "../../data/ten_codes.json";

fn main() {
    println!("cargo::rerun-if-changed={}", TABLE_PATH);
    let mut table_contents: String = String::new();
    File::open(TABLE_PATH)
        .unwrap_or_else(|err| panic!("Couldn't open ten-code table at {}: {}", TABLE_PATH, err))
        .read_to_string(&mut table_contents)
        .unwrap();
    let table: TenCodeTable = serde_json::from_str(&table_contents).unwrap();
    check_unique(&table);

    let mut tokens = TokenStream::new();
    tokens.append_all(gen_ten_codes_mod(&table));

    let str = tokens.to_string();

    let out_path = PathBuf::from_str(&std::env::var("OUT_DIR").unwrap())
        .unwrap()
        .join("gen.rs");
    File::create(out_path)
        .unwrap()
        .write_all(str.as_bytes())
        .unwrap();
}
