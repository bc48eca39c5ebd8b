use serde::Deserialize;
use serde::Serialize;

/// Coarse grouping of cursor kinds; the resolver picks its policy per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorCategory {
    Declaration,
    Reference,
    Expression,
    Statement,
    Preprocessing,
    Attribute,
    TranslationUnit,
    Invalid,
}

/// Syntactic kind of a cursor.
///
/// Variant order is significant: it is the last tie-breaker when ordering symbol keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CursorKind {
    // Declarations
    UnexposedDecl,
    StructDecl,
    UnionDecl,
    ClassDecl,
    EnumDecl,
    FieldDecl,
    EnumConstantDecl,
    FunctionDecl,
    VarDecl,
    ParmDecl,
    TypedefDecl,
    CxxMethod,
    Namespace,
    Constructor,
    Destructor,
    ConversionFunction,
    TemplateTypeParameter,
    NonTypeTemplateParameter,
    FunctionTemplate,
    ClassTemplate,
    NamespaceAlias,
    UsingDirective,
    UsingDeclaration,
    TypeAliasDecl,
    CxxAccessSpecifier,

    // References
    TypeRef,
    CxxBaseSpecifier,
    TemplateRef,
    NamespaceRef,
    MemberRef,
    LabelRef,
    OverloadedDeclRef,
    VariableRef,

    // Invalid
    InvalidFile,
    NoDeclFound,
    NotImplemented,
    InvalidCode,

    // Expressions
    UnexposedExpr,
    DeclRefExpr,
    MemberRefExpr,
    CallExpr,
    IntegerLiteral,
    StringLiteral,
    ParenExpr,
    UnaryOperator,
    BinaryOperator,
    ConditionalOperator,
    CStyleCastExpr,
    CxxThisExpr,
    CxxNewExpr,
    CxxDeleteExpr,
    LambdaExpr,

    // Statements
    UnexposedStmt,
    CompoundStmt,
    IfStmt,
    ForStmt,
    WhileStmt,
    ReturnStmt,
    DeclStmt,

    TranslationUnit,

    // Attributes
    UnexposedAttr,

    // Preprocessing
    PreprocessingDirective,
    MacroDefinition,
    MacroExpansion,
    InclusionDirective,
}

impl CursorKind {
    pub fn category(self) -> CursorCategory {
        use CursorKind::*;
        match self {
            UnexposedDecl | StructDecl | UnionDecl | ClassDecl | EnumDecl | FieldDecl
            | EnumConstantDecl | FunctionDecl | VarDecl | ParmDecl | TypedefDecl | CxxMethod
            | Namespace | Constructor | Destructor | ConversionFunction
            | TemplateTypeParameter | NonTypeTemplateParameter | FunctionTemplate
            | ClassTemplate | NamespaceAlias | UsingDirective | UsingDeclaration
            | TypeAliasDecl | CxxAccessSpecifier => CursorCategory::Declaration,
            TypeRef | CxxBaseSpecifier | TemplateRef | NamespaceRef | MemberRef | LabelRef
            | OverloadedDeclRef | VariableRef => CursorCategory::Reference,
            InvalidFile | NoDeclFound | NotImplemented | InvalidCode => CursorCategory::Invalid,
            UnexposedExpr | DeclRefExpr | MemberRefExpr | CallExpr | IntegerLiteral
            | StringLiteral | ParenExpr | UnaryOperator | BinaryOperator
            | ConditionalOperator | CStyleCastExpr | CxxThisExpr | CxxNewExpr
            | CxxDeleteExpr | LambdaExpr => CursorCategory::Expression,
            UnexposedStmt | CompoundStmt | IfStmt | ForStmt | WhileStmt | ReturnStmt
            | DeclStmt => CursorCategory::Statement,
            TranslationUnit => CursorCategory::TranslationUnit,
            UnexposedAttr => CursorCategory::Attribute,
            PreprocessingDirective | MacroDefinition | MacroExpansion | InclusionDirective => {
                CursorCategory::Preprocessing
            }
        }
    }

    pub fn is_invalid(self) -> bool {
        self.category() == CursorCategory::Invalid
    }

    pub fn is_reference(self) -> bool {
        self.category() == CursorCategory::Reference
    }

    pub fn is_expression(self) -> bool {
        self.category() == CursorCategory::Expression
    }

    pub fn is_call(self) -> bool {
        self == CursorKind::CallExpr
    }

    /// Kinds whose names make up a container chain.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            CursorKind::Namespace | CursorKind::ClassDecl | CursorKind::StructDecl
        )
    }

    /// Kinds that also get `Container::name` dictionary keys.
    pub fn is_dictionary_qualified(self) -> bool {
        matches!(
            self,
            CursorKind::Namespace
                | CursorKind::ClassDecl
                | CursorKind::StructDecl
                | CursorKind::FieldDecl
                | CursorKind::CxxMethod
                | CursorKind::Constructor
                | CursorKind::Destructor
        )
    }

    pub fn is_member_function(self) -> bool {
        matches!(
            self,
            CursorKind::CxxMethod | CursorKind::Constructor | CursorKind::Destructor
        )
    }
}
